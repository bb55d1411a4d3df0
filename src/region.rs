//! Regions, their chunks, and the per-region work of each generation stage.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, bail};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tessera_grid::seeds::rng_for;
use tessera_grid::{
    BorderDirection, CoordinateMap, CoordinateType, GridLevelConfig, GridPos, WorldPos, assign_height_ramp,
};
use tokio::sync::watch;
use tracing::debug;

use crate::settings::Settings;

/// How far a region has progressed through the pipeline.
///
/// Every stage waits on these instead of polling the region's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegionProgress {
    /// Identity only; no map yet.
    Created,
    /// Region map classified and chunks built.
    MapInitialized,
    ExitsGenerated,
    PathsGenerated,
    ZonesGenerated,
    /// Chunk heights set and chunk cell maps finalized.
    HeightsAssigned,
    /// A stage failed for this region. Sorts after every other state so waiters wake up.
    Failed,
}

/// One chunk of a region: a cell of the region map with its own cell-level map.
#[derive(Debug, Clone)]
pub struct Chunk {
    grid_position: GridPos,
    world_position: WorldPos,
    ground_height: i32,
    cells: CoordinateMap,
}

impl Chunk {
    /// Position on the region map.
    pub fn grid_position(&self) -> GridPos {
        self.grid_position
    }

    /// Minimum corner in world space.
    pub fn world_position(&self) -> WorldPos {
        self.world_position
    }

    /// The region's height until heights are assigned, then the ramped height.
    pub fn ground_height(&self) -> i32 {
        self.ground_height
    }

    /// The chunk's cell-level map (border offset 0).
    pub fn cells(&self) -> &CoordinateMap {
        &self.cells
    }
}

/// Mutable region data, populated stage by stage.
#[derive(Debug, Default)]
pub struct Region {
    map: Option<CoordinateMap>,
    chunks: BTreeMap<GridPos, Chunk>,
}

impl Region {
    pub fn map(&self) -> Option<&CoordinateMap> {
        self.map.as_ref()
    }

    pub fn chunks(&self) -> &BTreeMap<GridPos, Chunk> {
        &self.chunks
    }

    fn map_mut(&mut self) -> anyhow::Result<&mut CoordinateMap> {
        self.map.as_mut().context("region map has not been initialized")
    }
}

/// Shared handle to a region: fixed identity, locked data, and a readiness signal.
#[derive(Debug)]
pub struct RegionHandle {
    position: GridPos,
    order: usize,
    seed: u64,
    world_position: WorldPos,
    ground_height: i32,
    region: RwLock<Region>,
    progress: watch::Sender<RegionProgress>,
}

impl RegionHandle {
    pub fn new(position: GridPos, order: usize, seed: u64, world_position: WorldPos, ground_height: i32) -> Self {
        let (progress, _) = watch::channel(RegionProgress::Created);
        Self {
            position,
            order,
            seed,
            world_position,
            ground_height,
            region: RwLock::new(Region::default()),
            progress,
        }
    }

    pub fn position(&self) -> GridPos {
        self.position
    }

    /// Index in the world's region ordering; exits are generated in this order.
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn world_position(&self) -> WorldPos {
        self.world_position
    }

    pub fn ground_height(&self) -> i32 {
        self.ground_height
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Region> {
        self.region.read()
    }

    fn write(&self) -> RwLockWriteGuard<'_, Region> {
        self.region.write()
    }

    pub fn progress(&self) -> RegionProgress {
        *self.progress.borrow()
    }

    pub fn set_progress(&self, progress: RegionProgress) {
        self.progress.send_replace(progress);
    }

    /// Waits until this region reaches `target`.
    ///
    /// Errors if the region fails first.
    pub async fn reached(&self, target: RegionProgress) -> anyhow::Result<()> {
        let mut rx = self.progress.subscribe();
        let progress = *rx
            .wait_for(|p| *p >= target)
            .await
            .context("region progress signal closed")?;
        if progress == RegionProgress::Failed {
            bail!("region {} failed before reaching {:?}", self.position, target);
        }
        Ok(())
    }

    /// Builds the region's chunk-level map and one cell-level map per chunk.
    pub fn initialize(&self, settings: &Settings) -> anyhow::Result<()> {
        let chunk_size = settings.chunk_size();
        let map = CoordinateMap::new(GridLevelConfig::new(
            self.world_position,
            settings.region.width_in_chunks,
            chunk_size,
            settings.region.boundary_offset_in_chunks,
        ))?
        .with_path_randomness(settings.generation.path_randomness);

        let mut chunks = BTreeMap::new();
        for coordinate in map.coordinates() {
            let world_position = coordinate.world_position();
            let cells = CoordinateMap::new(GridLevelConfig::new(
                world_position,
                settings.chunk.width_in_cells,
                settings.chunk.cell_size,
                0,
            ))?;
            chunks.insert(
                coordinate.grid_position(),
                Chunk {
                    grid_position: coordinate.grid_position(),
                    world_position,
                    ground_height: self.ground_height,
                    cells,
                },
            );
        }

        let mut region = self.write();
        region.map = Some(map);
        region.chunks = chunks;
        debug!(region = %self.position, chunks = region.chunks.len(), "Initialized region");
        Ok(())
    }

    /// Resets the region map, then resolves each border against its neighbor.
    ///
    /// * No neighbor: the border is closed.
    /// * Neighbor earlier in the region order: its exits are mirrored.
    /// * Neighbor later in the order: random exits may be cut there.
    ///
    /// `neighbors` maps each direction to the neighbor's order and its exits on
    /// the border facing this region, or `None` if there is no neighbor.
    pub fn generate_necessary_exits(
        &self,
        neighbors: &BTreeMap<BorderDirection, Option<(usize, Vec<GridPos>)>>,
    ) -> anyhow::Result<usize> {
        let mut rng = rng_for(self.seed, "exits");
        let mut region = self.write();
        let map = region.map_mut()?;
        map.reset();

        let mut open = Vec::new();
        for direction in BorderDirection::ALL {
            match neighbors.get(&direction) {
                Some(Some((order, exits))) if *order < self.order => {
                    for exit in exits {
                        map.create_matching_exit(direction.opposite(), *exit)
                            .with_context(|| format!("mirroring exit {exit} from the {direction} neighbor"))?;
                    }
                }
                Some(Some(_)) => open.push(direction),
                _ => map.close_map_border(direction),
            }
        }
        if !open.is_empty() {
            map.generate_random_exits_on(&open, &mut rng);
        }

        let exits = map.count_of(CoordinateType::Exit);
        debug!(region = %self.position, exits, ?open, "Generated exits");
        Ok(exits)
    }

    pub fn generate_paths(&self) -> anyhow::Result<usize> {
        let mut rng = rng_for(self.seed, "paths");
        let mut region = self.write();
        let paths = region.map_mut()?.generate_paths_between_exits(&mut rng);
        debug!(region = %self.position, paths, "Generated paths");
        Ok(paths)
    }

    pub fn generate_zones(&self, settings: &Settings) -> anyhow::Result<usize> {
        let g = &settings.generation;
        let mut rng = rng_for(self.seed, "zones");
        let mut region = self.write();
        let zones = region
            .map_mut()?
            .generate_random_zones(g.min_zones, g.max_zones, &g.zone_shapes, &mut rng);
        debug!(region = %self.position, zones, "Generated zones");
        Ok(zones)
    }

    /// Assigns chunk ground heights along paths and finalizes chunk cell maps.
    ///
    /// `neighbor_heights` holds the ground height of each existing neighbor.
    /// An exit takes the floor-average of the two regions it joins, so both sides
    /// of a shared border agree. Paths are ramped between their endpoint heights;
    /// where paths overlap, the first assignment is kept. Chunk cell maps are walled
    /// toward missing or closed chunks, except where an exit opens onto a neighbor.
    pub fn assign_heights(&self, neighbor_heights: &BTreeMap<BorderDirection, i32>) -> anyhow::Result<()> {
        let mut region = self.write();
        let Region { map, chunks } = &mut *region;
        let map = map.as_ref().context("region map has not been initialized")?;

        let mut heights: BTreeMap<GridPos, i32> = BTreeMap::new();
        for direction in BorderDirection::ALL {
            let Some(&neighbor) = neighbor_heights.get(&direction) else {
                continue;
            };
            for exit in map.exits_on(direction) {
                heights.insert(exit, (self.ground_height + neighbor).div_euclid(2));
            }
        }

        for path in map.paths() {
            let start = heights.get(&path.start()).copied().unwrap_or(self.ground_height);
            let end = heights.get(&path.end()).copied().unwrap_or(self.ground_height);
            for (pos, h) in path.positions().iter().zip(assign_height_ramp(path.positions(), start, end)) {
                heights.entry(*pos).or_insert(h);
            }
        }
        for path in map.zones().iter().filter_map(|z| z.connection()) {
            // The zone end sits at ground height.
            let end = heights.get(&path.end()).copied().unwrap_or(self.ground_height);
            for (pos, h) in path
                .positions()
                .iter()
                .zip(assign_height_ramp(path.positions(), self.ground_height, end))
            {
                heights.entry(*pos).or_insert(h);
            }
        }

        // An exit opens onto the neighbor region across its border.
        let doorways: BTreeSet<(GridPos, BorderDirection)> = BorderDirection::ALL
            .into_iter()
            .flat_map(|d| map.exits_on(d).map(move |exit| (exit, d)))
            .collect();

        for (pos, chunk) in chunks.iter_mut() {
            chunk.ground_height = heights.get(pos).copied().unwrap_or(self.ground_height);
            chunk.cells.reset();
            for direction in BorderDirection::ALL {
                if doorways.contains(&(*pos, direction)) {
                    continue;
                }
                let facing = map.type_at(pos.step(direction));
                if matches!(facing, None | Some(CoordinateType::Closed)) {
                    chunk.cells.close_map_border(direction);
                }
            }
            chunk.cells.set_inactive_corners_to_type(CoordinateType::Border);
        }

        debug!(region = %self.position, ramped = heights.len(), "Assigned heights");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        let mut s = Settings::default();
        s.region.width_in_chunks = 9;
        s.chunk.width_in_cells = 4;
        s
    }

    fn handle(order: usize, ground_height: i32) -> RegionHandle {
        RegionHandle::new(GridPos::new(order as i32, 0), order, 42, WorldPos::default(), ground_height)
    }

    fn all_open(order: usize) -> BTreeMap<BorderDirection, Option<(usize, Vec<GridPos>)>> {
        BorderDirection::ALL.into_iter().map(|d| (d, Some((order, Vec::new())))).collect()
    }

    #[test]
    fn test_initialize_builds_chunks() {
        let h = handle(0, 2);
        h.initialize(&settings()).unwrap();
        let region = h.read();
        let map = region.map().unwrap();
        assert_eq!(map.width(), 9);
        assert_eq!(region.chunks().len(), 81);
        let chunk = &region.chunks()[&GridPos::new(3, 5)];
        assert_eq!(chunk.ground_height(), 2);
        assert_eq!(chunk.cells().width(), 4);
        assert_eq!(Some(chunk.world_position()), map.grid_to_world(GridPos::new(3, 5)));
    }

    #[test]
    fn test_stages_need_initialized_map() {
        let h = handle(0, 0);
        assert!(h.generate_paths().is_err());
        assert!(h.generate_necessary_exits(&all_open(1)).is_err());
    }

    #[test]
    fn test_exits_close_missing_neighbors() {
        let h = handle(0, 0);
        h.initialize(&settings()).unwrap();
        let neighbors: BTreeMap<_, Option<(usize, Vec<GridPos>)>> =
            BorderDirection::ALL.into_iter().map(|d| (d, None)).collect();
        assert_eq!(h.generate_necessary_exits(&neighbors).unwrap(), 0);
        let region = h.read();
        let map = region.map().unwrap();
        for d in BorderDirection::ALL {
            assert!(map.is_border_active(d));
        }
        assert_eq!(map.count_of(CoordinateType::Border), 0);
    }

    #[test]
    fn test_exits_mirror_earlier_neighbor() {
        let h = handle(1, 0);
        h.initialize(&settings()).unwrap();
        let mut neighbors = all_open(2);
        // West neighbor (order 0) has an exit on its east border at y = 3.
        neighbors.insert(BorderDirection::West, Some((0, vec![GridPos::new(7, 3)])));
        neighbors.insert(BorderDirection::North, None);
        h.generate_necessary_exits(&neighbors).unwrap();

        let region = h.read();
        let map = region.map().unwrap();
        assert_eq!(map.exits_on(BorderDirection::West).collect::<Vec<_>>(), vec![GridPos::new(1, 3)]);
        assert_eq!(map.exits_on(BorderDirection::North).count(), 0);
        assert!(map.is_border_active(BorderDirection::North));
    }

    #[test]
    fn test_assign_heights_averages_exits() {
        let h = handle(0, 4);
        h.initialize(&settings()).unwrap();
        {
            let mut region = h.write();
            let map = region.map_mut().unwrap();
            map.convert_coordinate_to_exit(GridPos::new(1, 4));
            map.convert_coordinate_to_exit(GridPos::new(7, 4));
            map.generate_paths_between_exits(&mut rng_for(1, "paths"));
        }
        let heights = BTreeMap::from([(BorderDirection::West, 1), (BorderDirection::East, 4)]);
        h.assign_heights(&heights).unwrap();

        let region = h.read();
        let chunks = region.chunks();
        assert_eq!(chunks[&GridPos::new(1, 4)].ground_height(), 2);
        assert_eq!(chunks[&GridPos::new(7, 4)].ground_height(), 4);
        // Every chunk along the path stays within the endpoint range.
        for pos in region.map().unwrap().paths()[0].positions() {
            let height = chunks[pos].ground_height();
            assert!((2..=4).contains(&height));
        }
        // Untouched chunks keep the region height.
        assert_eq!(chunks[&GridPos::new(4, 7)].ground_height(), 4);
    }

    #[test]
    fn test_exit_chunks_stay_open_toward_neighbor() {
        let h = handle(0, 0);
        h.initialize(&settings()).unwrap();
        {
            let mut region = h.write();
            let map = region.map_mut().unwrap();
            map.convert_coordinate_to_exit(GridPos::new(1, 4));
            map.close_map_border(BorderDirection::North);
        }
        h.assign_heights(&BTreeMap::from([(BorderDirection::West, 0)])).unwrap();

        let region = h.read();
        let exit = region.chunks()[&GridPos::new(1, 4)].cells();
        assert!(!exit.is_border_active(BorderDirection::West));
        assert_eq!(exit.count_of(CoordinateType::Closed), 0);
        // A plain border chunk beside it is still walled off from the outer ring.
        let beside = region.chunks()[&GridPos::new(1, 5)].cells();
        assert!(beside.is_border_active(BorderDirection::West));
        // A chunk facing a closed region border is walled on that side.
        let north = region.chunks()[&GridPos::new(4, 6)].cells();
        assert!(north.is_border_active(BorderDirection::North));
    }

    #[test]
    fn test_assign_heights_finalizes_cells() {
        let h = handle(0, 0);
        h.initialize(&settings()).unwrap();
        h.assign_heights(&BTreeMap::new()).unwrap();

        let region = h.read();
        // A chunk next to the closed outer ring closes its cell border on that side only.
        let edge = &region.chunks()[&GridPos::new(1, 4)];
        assert!(edge.cells().is_border_active(BorderDirection::West));
        assert!(!edge.cells().is_border_active(BorderDirection::East));
        // A chunk in the middle keeps every cell border open and recovers its corners.
        let middle = &region.chunks()[&GridPos::new(4, 4)].cells();
        assert_eq!(middle.count_of(CoordinateType::Closed), 0);
        assert_eq!(middle.count_of(CoordinateType::Border), 12);
    }

    #[tokio::test]
    async fn test_reached_resolves_and_fails() {
        let h = handle(0, 0);
        h.set_progress(RegionProgress::ExitsGenerated);
        h.reached(RegionProgress::MapInitialized).await.unwrap();

        h.set_progress(RegionProgress::Failed);
        assert!(h.reached(RegionProgress::PathsGenerated).await.is_err());
    }
}
