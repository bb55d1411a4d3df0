use std::collections::BTreeSet;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::GridError;
use crate::map::{CoordinateMap, CoordinateType, GridPos};

/// Types an exit-chain path may cross.
pub const EXIT_PATH_TYPES: [CoordinateType; 2] = [CoordinateType::Null, CoordinateType::Path];

/// An ordered 4-connected route between two grid positions.
///
/// The first position is `start`, the last is `end`, and every interior
/// position had one of `allowed_types` when the path was planned.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Path {
    start: GridPos,
    end: GridPos,
    allowed_types: BTreeSet<CoordinateType>,
    positions: Vec<GridPos>,
}

impl Path {
    /// First position of the route.
    pub fn start(&self) -> GridPos {
        self.start
    }

    /// Last position of the route.
    pub fn end(&self) -> GridPos {
        self.end
    }

    pub fn allowed_types(&self) -> &BTreeSet<CoordinateType> {
        &self.allowed_types
    }

    /// The route from `start` to `end`, both included.
    pub fn positions(&self) -> &[GridPos] {
        &self.positions
    }

    /// Number of positions, endpoints included.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Always `false` for a path returned by a map.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn contains(&self, pos: GridPos) -> bool {
        self.positions.contains(&pos)
    }

    /// Interior positions where the path changes direction.
    pub fn turns(&self) -> Vec<GridPos> {
        self.positions
            .windows(3)
            .filter(|w| w[0].direction_to(w[1]) != w[1].direction_to(w[2]))
            .map(|w| w[1])
            .collect()
    }
}

impl CoordinateMap {
    /// Plans a path from `start` to `end` through `allowed_types` and commits it.
    ///
    /// Interior positions become `Path`; the endpoints do too when
    /// `apply_type_to_ends` is set. The returned path is not registered with the
    /// map; callers decide which list it belongs to.
    ///
    /// # Arguments
    /// * `start` - First position of the path
    /// * `end` - Last position of the path
    /// * `allowed_types` - Types the interior may cross
    /// * `apply_type_to_ends` - Also mark the endpoints as `Path`
    /// * `rng` - Source of the meander noise
    ///
    /// # Returns
    /// * `Result<Path, GridError>` - The committed path, or `NoRoute`/`OutOfBounds`
    pub fn create_path_from<R: Rng + ?Sized>(
        &mut self,
        start: GridPos,
        end: GridPos,
        allowed_types: &[CoordinateType],
        apply_type_to_ends: bool,
        rng: &mut R,
    ) -> Result<Path, GridError> {
        self.plan_and_commit(start, end, allowed_types, apply_type_to_ends, rng)
            .map(|(path, _)| path)
    }

    /// Like [`create_path_from`](Self::create_path_from), also returning each
    /// changed position with its previous type so the commit can be undone.
    pub(crate) fn plan_and_commit<R: Rng + ?Sized>(
        &mut self,
        start: GridPos,
        end: GridPos,
        allowed_types: &[CoordinateType],
        apply_type_to_ends: bool,
        rng: &mut R,
    ) -> Result<(Path, Vec<(GridPos, CoordinateType)>), GridError> {
        let allowed: BTreeSet<CoordinateType> = allowed_types.iter().copied().collect();
        let positions = self.find_route(start, end, &allowed, rng)?;
        let path = Path {
            start,
            end,
            allowed_types: allowed,
            positions,
        };

        let last = path.positions.len().saturating_sub(1);
        let mut committed = Vec::new();
        for (i, &pos) in path.positions.iter().enumerate() {
            let is_end = i == 0 || i == last;
            if is_end && !apply_type_to_ends {
                continue;
            }
            let previous = self.set_type(pos, CoordinateType::Path)?;
            if previous != CoordinateType::Path {
                committed.push((pos, previous));
            }
        }
        debug!(%start, %end, len = path.len(), "Committed path");
        Ok((path, committed))
    }

    /// Rebuilds the exit chain: sorts exits by `(x, y)` and connects each
    /// consecutive pair through `Null` and `Path` cells.
    ///
    /// Existing paths (and the zones that hang off them) are cleared first.
    /// Fewer than two exits is a no-op. A pair with no route is skipped.
    ///
    /// # Returns
    /// * `usize` - Number of paths built
    pub fn generate_paths_between_exits<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        self.clear_paths();

        // Type index iteration is already (x, y) ordered.
        let exits: Vec<GridPos> = self.positions_of(CoordinateType::Exit).collect();
        if exits.len() < 2 {
            warn!(exits = exits.len(), "Not enough exits to generate paths");
            return 0;
        }

        for pair in exits.windows(2) {
            match self.create_path_from(pair[0], pair[1], &EXIT_PATH_TYPES, false, rng) {
                Ok(path) => self.paths.push(path),
                Err(e) => warn!(start = %pair[0], end = %pair[1], error = %e, "Skipping exit pair"),
            }
        }
        debug!(exits = exits.len(), paths = self.paths.len(), "Generated paths between exits");
        self.paths.len()
    }

    /// Removes every zone, then reverts every `Path` coordinate to `Null`.
    pub fn clear_paths(&mut self) {
        self.clear_zones();
        let cells: Vec<GridPos> = self.positions_of(CoordinateType::Path).collect();
        for pos in cells {
            self.retype(pos, CoordinateType::Null);
        }
        self.paths.clear();
    }
}
