//! Shaped zones and their connection to the path network.

use std::collections::BTreeSet;
use std::fmt;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::map::{CoordinateMap, CoordinateType, GridPos};
use crate::path::Path;

/// Types a zone connection path may cross.
pub const ZONE_PATH_TYPES: [CoordinateType; 3] = [CoordinateType::Null, CoordinateType::Zone, CoordinateType::Path];

/// Footprint of a zone relative to its center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ZoneShape {
    /// The center alone.
    Single,
    /// The center plus the midpoint of each side of the ring just inside the border.
    Full,
    /// The center plus its four edge neighbors.
    NaturalCross,
    /// The center plus its four diagonal neighbors.
    DiagonalCross,
    /// The center plus its east and west neighbors.
    Horizontal,
    /// The center plus its north and south neighbors.
    Vertical,
}

impl ZoneShape {
    /// Every shape, in declaration order.
    pub const ALL: [ZoneShape; 6] = [
        ZoneShape::Single,
        ZoneShape::Full,
        ZoneShape::NaturalCross,
        ZoneShape::DiagonalCross,
        ZoneShape::Horizontal,
        ZoneShape::Vertical,
    ];

    /// Member positions of a zone of this shape centered on `center`.
    ///
    /// `bounds` are the map's playable `(min, max)` indices; only `Full` uses them.
    pub fn members(self, center: GridPos, bounds: Option<(i32, i32)>) -> BTreeSet<GridPos> {
        let offset = |dx: i32, dy: i32| GridPos::new(center.x + dx, center.y + dy);
        let mut members = BTreeSet::from([center]);
        match self {
            ZoneShape::Single => {}
            ZoneShape::Full => {
                if let Some((min, max)) = bounds {
                    let mid = (min + max) / 2;
                    members.extend([
                        GridPos::new(mid, max - 1),
                        GridPos::new(max - 1, mid),
                        GridPos::new(mid, min + 1),
                        GridPos::new(min + 1, mid),
                    ]);
                }
            }
            ZoneShape::NaturalCross => members.extend([offset(0, 1), offset(1, 0), offset(0, -1), offset(-1, 0)]),
            ZoneShape::DiagonalCross => members.extend([offset(1, 1), offset(1, -1), offset(-1, -1), offset(-1, 1)]),
            ZoneShape::Horizontal => members.extend([offset(1, 0), offset(-1, 0)]),
            ZoneShape::Vertical => members.extend([offset(0, 1), offset(0, -1)]),
        }
        members
    }
}

impl fmt::Display for ZoneShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A zone's link to the path network and the cells that link overwrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ZoneConnection {
    path: Path,
    committed: Vec<(GridPos, CoordinateType)>,
}

/// A committed cluster of positions reserved for a feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    id: i32,
    shape: ZoneShape,
    center: GridPos,
    members: BTreeSet<GridPos>,
    valid: bool,
    connection: Option<ZoneConnection>,
}

impl Zone {
    /// Id unique within the owning map, counting up from 0 in creation order.
    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn shape(&self) -> ZoneShape {
        self.shape
    }

    pub fn center(&self) -> GridPos {
        self.center
    }

    /// Every position the zone occupies, the center included.
    pub fn members(&self) -> &BTreeSet<GridPos> {
        &self.members
    }

    /// Registered zones are always valid; rejected placements are never kept.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The path linking this zone to the network, if one could be built.
    pub fn connection(&self) -> Option<&Path> {
        self.connection.as_ref().map(|c| &c.path)
    }

    /// Positions the connection turned into `Path`, each with the type it had before.
    ///
    /// Positions that were already `Path` are not listed.
    pub fn connection_overwrote(&self) -> &[(GridPos, CoordinateType)] {
        self.connection.as_ref().map_or(&[], |c| c.committed.as_slice())
    }
}

impl CoordinateMap {
    /// Places a zone of `shape` centered on `pos` and connects it to the nearest path.
    ///
    /// Rejected (returns `false`, map untouched) unless every member is in bounds
    /// and currently `Null`. A zone with no reachable path is kept without a connection.
    pub fn create_world_zone<R: Rng + ?Sized>(&mut self, pos: GridPos, shape: ZoneShape, rng: &mut R) -> bool {
        let members = shape.members(pos, self.playable_bounds());
        if !members.iter().all(|p| self.type_at(*p) == Some(CoordinateType::Null)) {
            return false;
        }

        for member in &members {
            self.retype(*member, CoordinateType::Zone);
        }
        let id = self.next_zone_id;
        self.next_zone_id += 1;

        let connection = self.connect_zone(pos, &members, rng);
        if connection.is_none() && self.count_of(CoordinateType::Path) > 0 {
            warn!(id, center = %pos, "Zone has no connection to the path network");
        }
        debug!(id, %shape, center = %pos, members = members.len(), "Created zone");
        self.zones.push(Zone {
            id,
            shape,
            center: pos,
            members,
            valid: true,
            connection,
        });
        true
    }

    fn connect_zone<R: Rng + ?Sized>(
        &mut self,
        center: GridPos,
        members: &BTreeSet<GridPos>,
        rng: &mut R,
    ) -> Option<ZoneConnection> {
        let target = self.find_closest_coordinate_of_type(center, CoordinateType::Path)?;
        let from = members.iter().copied().min_by_key(|m| m.distance_sq(target))?;
        match self.plan_and_commit(from, target, &ZONE_PATH_TYPES, true, rng) {
            Ok((path, committed)) => Some(ZoneConnection { path, committed }),
            Err(e) => {
                warn!(%from, %target, error = %e, "Could not route zone connection");
                None
            }
        }
    }

    /// Clears existing zones, then places between `min` and `max` zones at shuffled `Null` positions.
    ///
    /// Each attempt picks a shape from `shapes`; rejected placements do not count.
    ///
    /// # Returns
    /// * `usize` - Number of zones placed
    pub fn generate_random_zones<R: Rng + ?Sized>(
        &mut self,
        min: usize,
        max: usize,
        shapes: &[ZoneShape],
        rng: &mut R,
    ) -> usize {
        self.clear_zones();
        if shapes.is_empty() {
            warn!("No zone shapes allowed");
            return 0;
        }

        if self.count_of(CoordinateType::Path) == 0 {
            // Adjacent exits chain without interior cells, leaving nothing to connect to.
            warn!(exits = self.count_of(CoordinateType::Exit), "No path cells; zones will be unconnected");
        }

        let target = rng.gen_range(min.min(max)..=max);
        let mut candidates: Vec<GridPos> = self.positions_of(CoordinateType::Null).collect();
        candidates.shuffle(rng);

        let mut placed = 0;
        for pos in candidates {
            if placed >= target {
                break;
            }
            let Some(&shape) = shapes.choose(rng) else {
                break;
            };
            if self.create_world_zone(pos, shape, rng) {
                placed += 1;
            }
        }
        if placed < target {
            warn!(placed, target, "Ran out of room for zones");
        }
        placed
    }

    /// Removes every zone, undoing connection paths newest first and reverting members to `Null`.
    pub fn clear_zones(&mut self) {
        let zones = std::mem::take(&mut self.zones);
        for zone in zones.iter().rev() {
            if let Some(connection) = &zone.connection {
                for &(pos, previous) in connection.committed.iter().rev() {
                    self.retype(pos, previous);
                }
            }
            for &member in &zone.members {
                if self.type_at(member) == Some(CoordinateType::Zone) {
                    self.retype(member, CoordinateType::Null);
                }
            }
        }
        self.next_zone_id = 0;
    }
}
