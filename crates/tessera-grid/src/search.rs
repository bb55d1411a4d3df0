/*

Two searches over a CoordinateMap:

  - Breadth-first flood from an origin to the nearest coordinate of a type.
    Every in-bounds cell is traversable; neighbors are visited N, E, S, W.

  - A* route between two endpoints whose interior may only use allowed types.
        f(n) = g(n) + h(n)
    g(n) sums per-cell step costs, h(n) is the Manhattan distance times the base
    step cost. Step costs are BASE + randomness * noise, noise drawn once per
    search from the seeded generator, so randomness 0 gives a shortest route and
    randomness 1 lets the route wander wherever the noise is cheap. h(n) never
    overestimates because every step costs at least BASE.

*/

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque};

use rand::Rng;

use crate::error::GridError;
use crate::map::{CoordinateMap, CoordinateType, GridPos};

/// Cost of one step with no meander.
pub const BASE_STEP_COST: u32 = 10;
/// Largest noise added to a step at randomness 1.
pub const MEANDER_COST: u32 = 40;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
struct State {
    cost: u32,
    position: GridPos,
}

// The priority queue depends on `Ord`.
// Flip the ordering on costs so the queue becomes a min-heap; ties fall back
// to position so the search order is fully deterministic.
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.position.cmp(&self.position))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Reconstructs the path from a map of `came_from` links.
fn reconstruct_path(came_from: &HashMap<GridPos, GridPos>, mut current: GridPos) -> Vec<GridPos> {
    let mut path = vec![current];
    while let Some(&previous) = came_from.get(&current) {
        path.push(previous);
        current = previous;
    }
    path.reverse();
    path
}

impl CoordinateMap {
    /// Breadth-first search outward from `origin` for the nearest coordinate of `target`.
    ///
    /// `origin` itself counts if it already has the target type.
    ///
    /// # Returns
    /// * `Option<GridPos>` - The nearest match, or `None` if the grid holds no reachable match
    pub fn find_closest_coordinate_of_type(&self, origin: GridPos, target: CoordinateType) -> Option<GridPos> {
        if !self.contains(origin) || self.count_of(target) == 0 {
            return None;
        }

        let mut visited = HashSet::from([origin]);
        let mut queue = VecDeque::from([origin]);
        while let Some(current) = queue.pop_front() {
            if self.type_at(current) == Some(target) {
                return Some(current);
            }
            for next in self.neighbors4(current) {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// Finds a route from `start` to `end` whose interior only uses `allowed` types.
    ///
    /// Endpoints may be of any type. Step costs are perturbed by the map's path
    /// randomness using noise drawn from `rng`.
    pub(crate) fn find_route<R: Rng + ?Sized>(
        &self,
        start: GridPos,
        end: GridPos,
        allowed: &BTreeSet<CoordinateType>,
        rng: &mut R,
    ) -> Result<Vec<GridPos>, GridError> {
        for p in [start, end] {
            if !self.contains(p) {
                return Err(GridError::OutOfBounds { position: p });
            }
        }

        let width = self.width();
        let randomness = self.path_randomness();
        let step_costs: Vec<u32> = (0..width * width)
            .map(|_| {
                let noise = rng.gen_range(0..=MEANDER_COST) as f32;
                BASE_STEP_COST + (randomness * noise).round() as u32
            })
            .collect();
        let step_cost = |p: GridPos| step_costs[(p.y * width + p.x) as usize];
        let passable = |p: GridPos| {
            p == end || self.type_at(p).is_some_and(|t| allowed.contains(&t))
        };
        let heuristic = |p: GridPos| p.manhattan(end) as u32 * BASE_STEP_COST;

        let mut open_set = BinaryHeap::new();
        let mut came_from: HashMap<GridPos, GridPos> = HashMap::new();
        let mut g_score: HashMap<GridPos, u32> = HashMap::from([(start, 0)]);

        open_set.push(State {
            cost: heuristic(start),
            position: start,
        });

        while let Some(State { cost, position: current }) = open_set.pop() {
            if current == end {
                return Ok(reconstruct_path(&came_from, current));
            }
            let current_g = g_score.get(&current).copied().unwrap_or(u32::MAX);
            if cost > current_g.saturating_add(heuristic(current)) {
                // Stale queue entry.
                continue;
            }

            for neighbor in self.neighbors4(current) {
                if !passable(neighbor) {
                    continue;
                }
                let tentative_g = current_g + step_cost(neighbor);
                if tentative_g < g_score.get(&neighbor).copied().unwrap_or(u32::MAX) {
                    came_from.insert(neighbor, current);
                    g_score.insert(neighbor, tentative_g);
                    open_set.push(State {
                        cost: tentative_g + heuristic(neighbor),
                        position: neighbor,
                    });
                }
            }
        }

        Err(GridError::NoRoute { start, end })
    }
}
