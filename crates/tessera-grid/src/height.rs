//! Corner-aware height ramps along paths.

use crate::map::GridPos;
use crate::path::Path;

/// Whether the path runs straight through `positions[i]`.
fn is_straight_through(positions: &[GridPos], i: usize) -> bool {
    let (prev, here, next) = (positions[i - 1], positions[i], positions[i + 1]);
    match (here.direction_to(prev), here.direction_to(next)) {
        (Some(back), Some(ahead)) => back.opposite() == ahead,
        _ => false,
    }
}

/// Assigns a discrete height to every position of a path.
///
/// The first and last positions take `start_height` and `end_height`. Walking
/// the interior, the height moves one step toward `end_height` at each
/// straight-through position and holds at every turn. If the path has fewer
/// straight-through positions than the height difference, the remainder is
/// absorbed on the final step.
pub fn assign_height_ramp(positions: &[GridPos], start_height: i32, end_height: i32) -> Vec<i32> {
    match positions.len() {
        0 => return Vec::new(),
        1 => return vec![start_height],
        _ => {}
    }

    let mut heights = Vec::with_capacity(positions.len());
    heights.push(start_height);
    let mut current = start_height;
    for i in 1..positions.len() - 1 {
        let height_left = end_height - current;
        if height_left != 0 && is_straight_through(positions, i) {
            current += height_left.signum();
        }
        heights.push(current);
    }
    heights.push(end_height);
    heights
}

impl Path {
    /// Heights along this path between two known endpoint heights.
    pub fn height_ramp(&self, start_height: i32, end_height: i32) -> Vec<i32> {
        assign_height_ramp(self.positions(), start_height, end_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(points: &[(i32, i32)]) -> Vec<GridPos> {
        points.iter().map(|&(x, y)| GridPos::new(x, y)).collect()
    }

    #[test]
    fn test_straight_ramp() {
        let path = line(&[(0, 0), (1, 0), (2, 0), (3, 0), (4, 0), (5, 0)]);
        assert_eq!(assign_height_ramp(&path, 0, 3), vec![0, 1, 2, 3, 3, 3]);
        assert_eq!(assign_height_ramp(&path, 5, 3), vec![5, 4, 3, 3, 3, 3]);
    }

    #[test]
    fn test_turns_hold_height() {
        // Straight, turn, straight, turn, end.
        let path = line(&[(0, 0), (1, 0), (2, 0), (2, 1), (2, 2), (3, 2)]);
        let heights = assign_height_ramp(&path, 0, 2);
        assert_eq!(heights, vec![0, 1, 1, 2, 2, 2]);
        // The turn at (2, 0) and (2, 2) never changes height.
        assert_eq!(heights[2], heights[1]);
        assert_eq!(heights[4], heights[3]);
    }

    #[test]
    fn test_monotonic_and_bounded() {
        let path = line(&[
            (0, 0),
            (0, 1),
            (0, 2),
            (0, 3),
            (1, 3),
            (2, 3),
            (2, 2),
            (2, 1),
            (3, 1),
            (4, 1),
            (5, 1),
        ]);
        let heights = assign_height_ramp(&path, 2, -3);
        assert_eq!(heights.first(), Some(&2));
        assert_eq!(heights.last(), Some(&-3));
        for i in 1..path.len() - 1 {
            let delta = heights[i] - heights[i - 1];
            assert!(delta == 0 || delta == -1);
            if !is_straight_through(&path, i) {
                assert_eq!(delta, 0, "height changed at turn {}", path[i]);
            }
        }
    }

    #[test]
    fn test_residual_on_last_step() {
        let path = line(&[(0, 0), (1, 0), (1, 1)]);
        assert_eq!(assign_height_ramp(&path, 0, 4), vec![0, 0, 4]);
    }

    #[test]
    fn test_degenerate_paths() {
        assert!(assign_height_ramp(&[], 1, 2).is_empty());
        assert_eq!(assign_height_ramp(&line(&[(3, 3)]), 1, 2), vec![1]);
        assert_eq!(assign_height_ramp(&line(&[(3, 3), (3, 4)]), 1, 2), vec![1, 2]);
    }
}
