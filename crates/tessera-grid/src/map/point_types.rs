use std::fmt;

/// Represents a point in grid coordinates (cell indices).
///
/// Ordering is lexicographic by `(x, y)`, which is the order exits are
/// chained in and the order regions are processed in.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridPos {
    /// The x-coordinate (column index) in the grid.
    pub x: i32,
    /// The y-coordinate (row index) in the grid.
    pub y: i32,
}

impl GridPos {
    /// Creates a new `GridPos`.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The position one step in `direction`.
    #[must_use]
    pub const fn step(self, direction: BorderDirection) -> Self {
        let (dx, dy) = direction.offset();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Manhattan distance to `other`.
    pub fn manhattan(self, other: GridPos) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Squared Euclidean distance to `other`.
    pub fn distance_sq(self, other: GridPos) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        dx * dx + dy * dy
    }

    /// The cardinal direction from `self` to an adjacent `other`, if they are 4-connected.
    pub fn direction_to(self, other: GridPos) -> Option<BorderDirection> {
        BorderDirection::ALL
            .into_iter()
            .find(|d| self.step(*d) == other)
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Represents a point in world coordinates (world units). `y` is up; the grid
/// spans the `x`/`z` plane.
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldPos {
    /// The x-coordinate.
    pub x: f32,
    /// The y-coordinate (height).
    pub y: f32,
    /// The z-coordinate.
    pub z: f32,
}

impl WorldPos {
    /// Creates a new `WorldPos`.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// The semantic classification of a grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CoordinateType {
    /// Open interior, free for paths and zones.
    Null,
    /// Playable border ring, not yet cut into an exit.
    Border,
    /// Walled off: outside the playable rectangle, a corner, or a closed border.
    Closed,
    /// A border coordinate connecting to the adjacent spatial unit.
    Exit,
    /// Part of a path.
    Path,
    /// Member of a zone.
    Zone,
}

impl CoordinateType {
    /// Every coordinate type, in index order.
    pub const ALL: [CoordinateType; 6] = [
        CoordinateType::Null,
        CoordinateType::Border,
        CoordinateType::Closed,
        CoordinateType::Exit,
        CoordinateType::Path,
        CoordinateType::Zone,
    ];

    /// Single character used when rendering a map as text.
    pub fn symbol(self) -> char {
        match self {
            CoordinateType::Null => '.',
            CoordinateType::Border => 'b',
            CoordinateType::Closed => '#',
            CoordinateType::Exit => 'E',
            CoordinateType::Path => 'o',
            CoordinateType::Zone => 'Z',
        }
    }
}

impl fmt::Display for CoordinateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One of the four edges of a grid's playable rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BorderDirection {
    /// `y == max`
    North,
    /// `x == max`
    East,
    /// `y == min`
    South,
    /// `x == min`
    West,
}

impl BorderDirection {
    /// All four directions, clockwise from north.
    pub const ALL: [BorderDirection; 4] = [
        BorderDirection::North,
        BorderDirection::East,
        BorderDirection::South,
        BorderDirection::West,
    ];

    /// The border facing this one across a shared edge.
    pub const fn opposite(self) -> Self {
        match self {
            BorderDirection::North => BorderDirection::South,
            BorderDirection::East => BorderDirection::West,
            BorderDirection::South => BorderDirection::North,
            BorderDirection::West => BorderDirection::East,
        }
    }

    /// Unit grid offset pointing out of the map through this border.
    pub const fn offset(self) -> (i32, i32) {
        match self {
            BorderDirection::North => (0, 1),
            BorderDirection::East => (1, 0),
            BorderDirection::South => (0, -1),
            BorderDirection::West => (-1, 0),
        }
    }

    /// Whether positions along this border vary in `x` (north/south) rather than `y`.
    pub const fn runs_along_x(self) -> bool {
        matches!(self, BorderDirection::North | BorderDirection::South)
    }

    /// The lateral offset of `pos` along this border.
    pub const fn lateral(self, pos: GridPos) -> i32 {
        if self.runs_along_x() { pos.x } else { pos.y }
    }
}

impl fmt::Display for BorderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
