//! This module defines the error types used by the `tessera-grid` crate.

#![warn(missing_docs)]

use thiserror::Error;

use crate::map::GridPos;

/// Error type for grid operations.
///
/// Placement failures (a zone overlapping occupied cells) and search misses
/// (no coordinate of the requested type reachable) are ordinary control flow
/// and are reported through `bool`/`Option` results instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    /// The grid width is not positive.
    #[error("Invalid grid dimensions: {0}")]
    InvalidDimensions(&'static str),
    /// The size of one coordinate in world units is not positive.
    #[error("Invalid coordinate size: {0}")]
    InvalidCellSize(&'static str),
    /// The border offset is negative.
    #[error("Invalid border offset: {0}")]
    InvalidBorderOffset(&'static str),
    /// A position outside the grid was addressed.
    #[error("Grid access out of bounds at {position}")]
    OutOfBounds {
        /// The offending position.
        position: GridPos,
    },
    /// No route through the allowed coordinate types connects the endpoints.
    #[error("No route from {start} to {end}")]
    NoRoute {
        /// Path start.
        start: GridPos,
        /// Path end.
        end: GridPos,
    },
}
