use super::{CoordinateType, GridPos, WorldPos};

/// A single cell of a [`CoordinateMap`](super::CoordinateMap).
///
/// Coordinates are only reachable through a borrow of the map that owns them,
/// and their type can only change through [`CoordinateMap::set_type`](super::CoordinateMap::set_type),
/// which keeps the map's indices in step with the cell.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coordinate {
    grid_position: GridPos,
    world_position: WorldPos,
    coordinate_type: CoordinateType,
}

impl Coordinate {
    pub(crate) fn new(grid_position: GridPos, world_position: WorldPos, coordinate_type: CoordinateType) -> Self {
        Self {
            grid_position,
            world_position,
            coordinate_type,
        }
    }

    /// Integer position in the owning grid.
    pub fn grid_position(&self) -> GridPos {
        self.grid_position
    }

    /// World position of the cell's minimum corner.
    pub fn world_position(&self) -> WorldPos {
        self.world_position
    }

    /// Current classification.
    pub fn coordinate_type(&self) -> CoordinateType {
        self.coordinate_type
    }

    pub(crate) fn set_coordinate_type(&mut self, coordinate_type: CoordinateType) {
        self.coordinate_type = coordinate_type;
    }
}
