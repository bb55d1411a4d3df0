//! The classified coordinate grid and the indexes kept alongside it.

#![warn(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{debug, trace};

use super::{BorderDirection, Coordinate, CoordinateType, GridPos, WorldPos};
use crate::error::GridError;
use crate::path::Path;
use crate::zone::Zone;

/// Geometry of one spatial level (world, region or chunk).
///
/// Every level builds its map from one of these; the map never needs to know
/// which kind of spatial unit it belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridLevelConfig {
    /// World position of cell `(0, 0)`'s minimum corner.
    pub origin: WorldPos,
    /// Number of cells along each side.
    pub width_count: i32,
    /// Size of one cell in world units.
    pub coordinate_size: f32,
    /// Rings reserved as closed boundary outside the playable border ring.
    pub border_offset: i32,
}

impl GridLevelConfig {
    /// Creates a new `GridLevelConfig`.
    pub const fn new(origin: WorldPos, width_count: i32, coordinate_size: f32, border_offset: i32) -> Self {
        Self {
            origin,
            width_count,
            coordinate_size,
            border_offset,
        }
    }
}

/// A dense square grid of classified [`Coordinate`]s for one spatial level.
///
/// The map keeps a type index (type to positions), a border index (border to
/// positions) and an exit index (border to exit positions). All three are
/// maintained by [`CoordinateMap::set_type`], which is the only way a
/// coordinate's type changes.
#[derive(Debug, Clone)]
pub struct CoordinateMap {
    config: GridLevelConfig,
    path_randomness: f32,
    grid: Vec<Coordinate>,
    type_index: BTreeMap<CoordinateType, BTreeSet<GridPos>>,
    border_index: BTreeMap<BorderDirection, BTreeSet<GridPos>>,
    border_exit_index: BTreeMap<BorderDirection, BTreeSet<GridPos>>,
    corner_index: BTreeMap<BorderDirection, (GridPos, GridPos)>,
    active_borders: BTreeMap<BorderDirection, bool>,
    pub(crate) paths: Vec<Path>,
    pub(crate) zones: Vec<Zone>,
    pub(crate) next_zone_id: i32,
}

impl CoordinateMap {
    /// Creates a new map from a level configuration and computes its default classification.
    ///
    /// # Arguments
    /// * `config` - Origin, width, cell size and border offset of the level.
    ///
    /// # Returns
    /// * `Result<Self, GridError>` - The classified map or an error if parameters are invalid
    pub fn new(config: GridLevelConfig) -> Result<Self, GridError> {
        if config.width_count <= 0 {
            return Err(GridError::InvalidDimensions("Width must be positive"));
        }
        if config.width_count.checked_mul(config.width_count).is_none() {
            return Err(GridError::InvalidDimensions("Map dimensions too large, would cause overflow"));
        }
        if !(config.coordinate_size > 0.0) {
            return Err(GridError::InvalidCellSize("Coordinate size must be positive"));
        }
        if config.border_offset < 0 {
            return Err(GridError::InvalidBorderOffset("Border offset must not be negative"));
        }

        let mut map = CoordinateMap {
            config,
            path_randomness: 0.0,
            grid: Vec::new(),
            type_index: BTreeMap::new(),
            border_index: BTreeMap::new(),
            border_exit_index: BTreeMap::new(),
            corner_index: BTreeMap::new(),
            active_borders: BTreeMap::new(),
            paths: Vec::new(),
            zones: Vec::new(),
            next_zone_id: 0,
        };
        map.classify();
        Ok(map)
    }

    /// Sets how far generated paths may wander from the shortest route (clamped to `[0, 1]`).
    #[must_use]
    pub fn with_path_randomness(mut self, randomness: f32) -> Self {
        self.set_path_randomness(randomness);
        self
    }

    /// Sets how far generated paths may wander from the shortest route (clamped to `[0, 1]`).
    pub fn set_path_randomness(&mut self, randomness: f32) {
        self.path_randomness = if randomness.is_nan() { 0.0 } else { randomness.clamp(0.0, 1.0) };
    }

    /// Current path randomness factor.
    pub fn path_randomness(&self) -> f32 {
        self.path_randomness
    }

    /// Discards every exit, path and zone and recomputes the default classification.
    pub fn reset(&mut self) {
        self.classify();
    }

    /// Computes the default classification from `(width_count, border_offset)`.
    fn classify(&mut self) {
        let n = self.config.width_count;
        let min = self.config.border_offset;
        let max = n - self.config.border_offset - 1;

        self.grid.clear();
        self.grid.reserve((n * n) as usize);
        self.type_index = CoordinateType::ALL.into_iter().map(|t| (t, BTreeSet::new())).collect();
        self.border_index = BorderDirection::ALL.into_iter().map(|d| (d, BTreeSet::new())).collect();
        self.border_exit_index = BorderDirection::ALL.into_iter().map(|d| (d, BTreeSet::new())).collect();
        self.active_borders = BorderDirection::ALL.into_iter().map(|d| (d, false)).collect();
        self.corner_index.clear();
        self.paths.clear();
        self.zones.clear();
        self.next_zone_id = 0;

        if min <= max {
            self.corner_index.insert(BorderDirection::North, (GridPos::new(min, max), GridPos::new(max, max)));
            self.corner_index.insert(BorderDirection::East, (GridPos::new(max, min), GridPos::new(max, max)));
            self.corner_index.insert(BorderDirection::South, (GridPos::new(min, min), GridPos::new(max, min)));
            self.corner_index.insert(BorderDirection::West, (GridPos::new(min, min), GridPos::new(min, max)));
        }

        for y in 0..n {
            for x in 0..n {
                let pos = GridPos::new(x, y);
                let outside = x < min || x > max || y < min || y > max;
                let on_x_edge = x == min || x == max;
                let on_y_edge = y == min || y == max;

                let coordinate_type = if outside || (on_x_edge && on_y_edge) {
                    CoordinateType::Closed
                } else if on_x_edge || on_y_edge {
                    // First match wins: East, West, North, South.
                    let direction = if x == max {
                        BorderDirection::East
                    } else if x == min {
                        BorderDirection::West
                    } else if y == max {
                        BorderDirection::North
                    } else {
                        BorderDirection::South
                    };
                    self.border_index.entry(direction).or_default().insert(pos);
                    CoordinateType::Border
                } else {
                    CoordinateType::Null
                };

                self.type_index.entry(coordinate_type).or_default().insert(pos);
                let world = self.world_position_of(pos);
                self.grid.push(Coordinate::new(pos, world, coordinate_type));
            }
        }

        debug!(
            width = n,
            border_offset = self.config.border_offset,
            borders = self.count_of(CoordinateType::Border),
            "Classified coordinate map"
        );
    }

    /// Changes the type of the coordinate at `pos`, keeping every index in step.
    ///
    /// This is the only mutator of coordinate types.
    ///
    /// # Returns
    /// * `Result<CoordinateType, GridError>` - The previous type, or an error if `pos` is out of bounds
    pub fn set_type(&mut self, pos: GridPos, new_type: CoordinateType) -> Result<CoordinateType, GridError> {
        let index = self.index_of(pos).ok_or(GridError::OutOfBounds { position: pos })?;
        let old_type = self.grid[index].coordinate_type();
        if old_type == new_type {
            return Ok(old_type);
        }

        let removed = self
            .type_index
            .get_mut(&old_type)
            .is_some_and(|bucket| bucket.remove(&pos));
        debug_assert!(removed, "coordinate {pos} missing from its {old_type} bucket");
        self.type_index.entry(new_type).or_default().insert(pos);

        if let Some(direction) = self.border_of(pos) {
            if old_type == CoordinateType::Exit {
                if let Some(exits) = self.border_exit_index.get_mut(&direction) {
                    exits.remove(&pos);
                }
            }
            if new_type == CoordinateType::Exit {
                self.border_exit_index.entry(direction).or_default().insert(pos);
            }
        }

        self.grid[index].set_coordinate_type(new_type);
        trace!(%pos, from = %old_type, to = %new_type, "Coordinate type changed");
        Ok(old_type)
    }

    /// Retypes a position taken from one of the map's own indexes.
    ///
    /// Such a position is always inside the grid; an out-of-bounds one means the
    /// indexes and the grid have diverged, which is unrecoverable.
    pub(crate) fn retype(&mut self, pos: GridPos, new_type: CoordinateType) -> CoordinateType {
        match self.set_type(pos, new_type) {
            Ok(previous) => previous,
            Err(e) => panic!("coordinate index out of step with the grid: {e}"),
        }
    }

    /// Walls off a border because no neighboring spatial unit exists on that side.
    ///
    /// Marks the border active and sets every position on it to `Closed`.
    pub fn close_map_border(&mut self, direction: BorderDirection) {
        self.active_borders.insert(direction, true);
        let positions: Vec<GridPos> = self.border_positions(direction).collect();
        for pos in positions {
            self.retype(pos, CoordinateType::Closed);
        }
        debug!(%direction, "Closed map border");
    }

    /// Reclassifies each corner whose two adjoining borders are both inactive.
    ///
    /// Corners start out `Closed`; this recovers the ones that only touch open edges.
    pub fn set_inactive_corners_to_type(&mut self, coordinate_type: CoordinateType) {
        let Some(&(_, north_east)) = self.corner_index.get(&BorderDirection::North) else {
            return;
        };
        let Some(&(south_west, south_east)) = self.corner_index.get(&BorderDirection::South) else {
            return;
        };
        let Some(&(_, north_west)) = self.corner_index.get(&BorderDirection::West) else {
            return;
        };

        let corners = [
            (north_east, BorderDirection::North, BorderDirection::East),
            (south_east, BorderDirection::South, BorderDirection::East),
            (south_west, BorderDirection::South, BorderDirection::West),
            (north_west, BorderDirection::North, BorderDirection::West),
        ];
        for (corner, a, b) in corners {
            if !self.is_border_active(a) && !self.is_border_active(b) {
                self.retype(corner, coordinate_type);
            }
        }
    }

    /// Calculates the index in the grid vector for a given position.
    fn index_of(&self, pos: GridPos) -> Option<usize> {
        self.contains(pos)
            .then(|| (pos.y * self.config.width_count + pos.x) as usize)
    }

    fn world_position_of(&self, pos: GridPos) -> WorldPos {
        let size = self.config.coordinate_size;
        WorldPos::new(
            self.config.origin.x + pos.x as f32 * size,
            self.config.origin.y,
            self.config.origin.z + pos.y as f32 * size,
        )
    }

    /// Whether `pos` lies inside the grid.
    pub fn contains(&self, pos: GridPos) -> bool {
        let n = self.config.width_count;
        pos.x >= 0 && pos.y >= 0 && pos.x < n && pos.y < n
    }

    /// The level configuration this map was built from.
    pub fn config(&self) -> &GridLevelConfig {
        &self.config
    }

    /// Number of cells along each side.
    pub fn width(&self) -> i32 {
        self.config.width_count
    }

    /// Rings reserved as closed boundary.
    pub fn border_offset(&self) -> i32 {
        self.config.border_offset
    }

    /// `(min, max)` indices of the playable rectangle, if it is non-empty.
    pub fn playable_bounds(&self) -> Option<(i32, i32)> {
        let min = self.config.border_offset;
        let max = self.config.width_count - self.config.border_offset - 1;
        (min <= max).then_some((min, max))
    }

    /// The coordinate at `pos`.
    pub fn coordinate(&self, pos: GridPos) -> Option<&Coordinate> {
        self.index_of(pos).map(|i| &self.grid[i])
    }

    /// The type of the coordinate at `pos`.
    pub fn type_at(&self, pos: GridPos) -> Option<CoordinateType> {
        self.coordinate(pos).map(Coordinate::coordinate_type)
    }

    /// All coordinates, row by row from `y == 0`.
    pub fn coordinates(&self) -> impl Iterator<Item = &Coordinate> + '_ {
        self.grid.iter()
    }

    /// Positions currently of `coordinate_type`, in lexicographic order.
    pub fn positions_of(&self, coordinate_type: CoordinateType) -> impl Iterator<Item = GridPos> + '_ {
        self.type_index.get(&coordinate_type).into_iter().flatten().copied()
    }

    /// Number of positions currently of `coordinate_type`.
    pub fn count_of(&self, coordinate_type: CoordinateType) -> usize {
        self.type_index.get(&coordinate_type).map_or(0, BTreeSet::len)
    }

    /// Every position recorded on `direction`'s border, whatever its current type.
    pub fn border_positions(&self, direction: BorderDirection) -> impl Iterator<Item = GridPos> + '_ {
        self.border_index.get(&direction).into_iter().flatten().copied()
    }

    /// Exit positions on `direction`'s border.
    pub fn exits_on(&self, direction: BorderDirection) -> impl Iterator<Item = GridPos> + '_ {
        self.border_exit_index.get(&direction).into_iter().flatten().copied()
    }

    /// The border a position was classified onto, if any. Corners belong to no border.
    pub fn border_of(&self, pos: GridPos) -> Option<BorderDirection> {
        BorderDirection::ALL
            .into_iter()
            .find(|d| self.border_index.get(d).is_some_and(|set| set.contains(&pos)))
    }

    /// The two corner positions at the ends of `direction`'s border.
    pub fn corner_positions(&self, direction: BorderDirection) -> Option<(GridPos, GridPos)> {
        self.corner_index.get(&direction).copied()
    }

    /// Whether `direction`'s border has been walled off.
    pub fn is_border_active(&self, direction: BorderDirection) -> bool {
        self.active_borders.get(&direction).copied().unwrap_or(false)
    }

    /// In-bounds 4-connected neighbors of `pos`, clockwise from north.
    pub fn neighbors4(&self, pos: GridPos) -> impl Iterator<Item = GridPos> + '_ {
        BorderDirection::ALL
            .into_iter()
            .map(move |d| pos.step(d))
            .filter(|p| self.contains(*p))
    }

    /// Paths connecting consecutive exits.
    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    /// Committed zones.
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Exit-chain paths followed by every zone connection path.
    pub fn all_paths(&self) -> impl Iterator<Item = &Path> + '_ {
        self.paths
            .iter()
            .chain(self.zones.iter().filter_map(Zone::connection))
    }

    /// Converts grid coordinates to the world position of the cell's minimum corner.
    /// Returns None if the grid coordinates are outside the map.
    pub fn grid_to_world(&self, pos: GridPos) -> Option<WorldPos> {
        self.contains(pos).then(|| self.world_position_of(pos))
    }

    /// Converts a world position to grid coordinates.
    /// Returns None if the position is outside the map bounds; a position exactly
    /// on the max boundary is considered outside.
    pub fn world_to_grid(&self, world: WorldPos) -> Option<GridPos> {
        let size = self.config.coordinate_size;
        let gx = (world.x - self.config.origin.x) / size;
        let gz = (world.z - self.config.origin.z) / size;
        let n = self.config.width_count as f32;
        if gx < 0.0 || gz < 0.0 || gx >= n || gz >= n {
            return None;
        }
        let pos = GridPos::new(gx.floor() as i32, gz.floor() as i32);
        self.contains(pos).then_some(pos)
    }

    /// Minimum and maximum world corners covered by the map.
    pub fn world_bounds(&self) -> (WorldPos, WorldPos) {
        let origin = self.config.origin;
        let extent = self.config.width_count as f32 * self.config.coordinate_size;
        (origin, WorldPos::new(origin.x + extent, origin.y, origin.z + extent))
    }
}

impl fmt::Display for CoordinateMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "CoordinateMap ({}x{}, coordinate size: {:.3}, border offset: {})",
            self.config.width_count, self.config.width_count, self.config.coordinate_size, self.config.border_offset
        )?;
        // North at the top.
        for y in (0..self.config.width_count).rev() {
            for x in 0..self.config.width_count {
                if let Some(t) = self.type_at(GridPos::new(x, y)) {
                    write!(f, "{}", t.symbol())?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
