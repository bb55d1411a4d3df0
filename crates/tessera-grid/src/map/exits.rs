//! Exit cutting and cross-unit exit matching.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use super::{BorderDirection, CoordinateMap, CoordinateType, GridPos};
use crate::error::GridError;

/// Fewest exits a random exit pass cuts.
pub const MIN_RANDOM_EXITS: usize = 2;
/// Most exits a random exit pass cuts.
pub const MAX_RANDOM_EXITS: usize = 4;

impl CoordinateMap {
    /// Turns a border coordinate into an exit.
    ///
    /// No-op (returns `false`) unless the coordinate is currently `Border` and
    /// lies on one of the four borders.
    pub fn convert_coordinate_to_exit(&mut self, pos: GridPos) -> bool {
        if self.type_at(pos) != Some(CoordinateType::Border) || self.border_of(pos).is_none() {
            return false;
        }
        self.set_type(pos, CoordinateType::Exit).is_ok()
    }

    /// Cuts between two and four exits at random positions on any border.
    ///
    /// # Returns
    /// * `Vec<GridPos>` - The positions converted, in selection order
    pub fn generate_random_exits<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<GridPos> {
        self.generate_random_exits_on(&BorderDirection::ALL, rng)
    }

    /// Cuts between two and four exits at random `Border` positions on the given borders.
    ///
    /// The count is drawn first, then every candidate is shuffled and the first
    /// `count` are converted. Fewer candidates than `count` converts them all.
    pub fn generate_random_exits_on<R: Rng + ?Sized>(
        &mut self,
        directions: &[BorderDirection],
        rng: &mut R,
    ) -> Vec<GridPos> {
        let count = rng.gen_range(MIN_RANDOM_EXITS..=MAX_RANDOM_EXITS);
        let mut candidates: Vec<GridPos> = self
            .positions_of(CoordinateType::Border)
            .filter(|p| self.border_of(*p).is_some_and(|d| directions.contains(&d)))
            .collect();
        candidates.shuffle(rng);

        let converted: Vec<GridPos> = candidates
            .into_iter()
            .take(count)
            .filter(|p| self.convert_coordinate_to_exit(*p))
            .collect();
        debug!(requested = count, cut = converted.len(), ?directions, "Generated random exits");
        converted
    }

    /// Mirrors an adjacent unit's exit onto this map.
    ///
    /// `neighbor_border` is the border of the *neighbor* the exit sits on (the one
    /// facing this map). The matching position is on this map's opposite border at
    /// the same lateral offset.
    ///
    /// # Returns
    /// * `Ok(Some(pos))` - The mirrored position was converted to an exit
    /// * `Ok(None)` - The mirrored position was not a plain border coordinate
    /// * `Err(GridError::OutOfBounds)` - The lateral offset does not fit this map
    pub fn create_matching_exit(
        &mut self,
        neighbor_border: BorderDirection,
        neighbor_exit: GridPos,
    ) -> Result<Option<GridPos>, GridError> {
        let (min, max) = self
            .playable_bounds()
            .ok_or(GridError::OutOfBounds { position: neighbor_exit })?;
        let lateral = neighbor_border.lateral(neighbor_exit);
        let mirror = match neighbor_border.opposite() {
            BorderDirection::North => GridPos::new(lateral, max),
            BorderDirection::South => GridPos::new(lateral, min),
            BorderDirection::East => GridPos::new(max, lateral),
            BorderDirection::West => GridPos::new(min, lateral),
        };
        if !self.contains(mirror) {
            return Err(GridError::OutOfBounds { position: mirror });
        }
        Ok(self.convert_coordinate_to_exit(mirror).then_some(mirror))
    }

    /// Reverts every exit to `Border`, clearing paths and zones first.
    ///
    /// # Returns
    /// * `usize` - Number of exits reverted
    pub fn clear_exits(&mut self) -> usize {
        self.clear_paths();
        let exits: Vec<GridPos> = self.positions_of(CoordinateType::Exit).collect();
        for pos in &exits {
            self.retype(*pos, CoordinateType::Border);
        }
        exits.len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::map::{GridLevelConfig, WorldPos};
    use crate::seeds::rng_from_str;

    fn map(width: i32, border_offset: i32) -> CoordinateMap {
        CoordinateMap::new(GridLevelConfig::new(WorldPos::default(), width, 1.0, border_offset)).unwrap()
    }

    #[test]
    fn test_convert_only_border() {
        let mut m = map(9, 1);
        assert!(!m.convert_coordinate_to_exit(GridPos::new(4, 4)), "Null is not convertible");
        assert!(!m.convert_coordinate_to_exit(GridPos::new(1, 1)), "Corner is not convertible");
        assert!(!m.convert_coordinate_to_exit(GridPos::new(0, 4)), "Outside ring is not convertible");
        assert!(m.convert_coordinate_to_exit(GridPos::new(1, 4)));
        assert!(!m.convert_coordinate_to_exit(GridPos::new(1, 4)), "Already an exit");
        assert_eq!(m.exits_on(BorderDirection::West).collect::<Vec<_>>(), vec![GridPos::new(1, 4)]);
    }

    #[test]
    fn test_random_exit_count() {
        for seed in ["alpha", "beta", "gamma", "delta", "epsilon"] {
            let mut m = map(9, 1);
            let mut rng = rng_from_str(seed);
            let exits = m.generate_random_exits(&mut rng);
            assert!((MIN_RANDOM_EXITS..=MAX_RANDOM_EXITS).contains(&exits.len()));
            assert_eq!(m.count_of(CoordinateType::Exit), exits.len());
            for pos in exits {
                assert!(m.border_of(pos).is_some());
            }
        }
    }

    #[test]
    fn test_random_exits_deterministic() {
        let mut first = map(9, 1);
        let mut second = map(9, 1);
        let a: BTreeSet<GridPos> = first.generate_random_exits(&mut rng_from_str("alpha")).into_iter().collect();
        let b: BTreeSet<GridPos> = second.generate_random_exits(&mut rng_from_str("alpha")).into_iter().collect();
        assert_eq!(a, b);

        // Re-running on the same map after clearing selects the same set again.
        first.clear_exits();
        let c: BTreeSet<GridPos> = first.generate_random_exits(&mut rng_from_str("alpha")).into_iter().collect();
        assert_eq!(a, c);
    }

    #[test]
    fn test_random_exits_restricted_to_directions() {
        let mut m = map(9, 1);
        let exits = m.generate_random_exits_on(&[BorderDirection::South], &mut rng_from_str("alpha"));
        assert!(!exits.is_empty());
        for pos in exits {
            assert_eq!(m.border_of(pos), Some(BorderDirection::South));
        }
    }

    #[test]
    fn test_random_exits_on_closed_borders() {
        let mut m = map(9, 1);
        for d in BorderDirection::ALL {
            m.close_map_border(d);
        }
        assert!(m.generate_random_exits(&mut rng_from_str("alpha")).is_empty());
    }

    #[test]
    fn test_matching_exit_round_trip() {
        for d in BorderDirection::ALL {
            for lateral in 2..=6 {
                let mut neighbor = map(9, 1);
                let exit = neighbor
                    .border_positions(d)
                    .find(|p| d.lateral(*p) == lateral)
                    .unwrap();
                assert!(neighbor.convert_coordinate_to_exit(exit));

                let mut local = map(9, 1);
                let mirrored = local.create_matching_exit(d, exit).unwrap().unwrap();
                assert_eq!(local.count_of(CoordinateType::Exit), 1);
                assert_eq!(local.border_of(mirrored), Some(d.opposite()));
                assert_eq!(d.opposite().lateral(mirrored), lateral);
                assert_eq!(local.exits_on(d.opposite()).collect::<Vec<_>>(), vec![mirrored]);
            }
        }
    }

    #[test]
    fn test_matching_exit_south_to_north() {
        let mut local = map(9, 0);
        let mirrored = local
            .create_matching_exit(BorderDirection::South, GridPos::new(3, 0))
            .unwrap();
        assert_eq!(mirrored, Some(GridPos::new(3, 8)));
    }

    #[test]
    fn test_matching_exit_out_of_range() {
        let mut local = map(9, 1);
        assert!(matches!(
            local.create_matching_exit(BorderDirection::West, GridPos::new(1, 12)),
            Err(GridError::OutOfBounds { .. })
        ));
        // Lateral offset landing on a corner leaves the map untouched.
        assert_eq!(local.create_matching_exit(BorderDirection::West, GridPos::new(1, 1)).unwrap(), None);
    }
}
