//! Grid-related functionality for world generation.
//!
//! This module provides the classified coordinate grid shared by every spatial
//! level (world, region, chunk) together with its point and type vocabulary.

pub mod coordinate;
pub mod coordinate_map;
pub mod exits;
pub mod point_types;

pub use coordinate::Coordinate;
pub use coordinate_map::{CoordinateMap, GridLevelConfig};
pub use point_types::{BorderDirection, CoordinateType, GridPos, WorldPos};
