pub mod error;
pub mod height;
pub mod map;
pub mod path;
pub mod search;
pub mod seeds;
pub mod zone;

pub use error::GridError;
pub use height::assign_height_ramp;
pub use map::{BorderDirection, Coordinate, CoordinateMap, CoordinateType, GridLevelConfig, GridPos, WorldPos};
pub use path::Path;
pub use seeds::GridRng;
pub use zone::{Zone, ZoneShape};
