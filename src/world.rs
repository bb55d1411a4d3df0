use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;
use tessera_grid::seeds::{derive_seed, rng_for, seed_from_str};
use tessera_grid::{BorderDirection, CoordinateMap, GridLevelConfig, GridPos, WorldPos};
use tracing::info;

use crate::region::RegionHandle;
use crate::settings::Settings;

/// The top spatial level: a world map whose coordinates are regions.
#[derive(Debug)]
pub struct World {
    settings: Arc<Settings>,
    seed: u64,
    map: CoordinateMap,
    regions: RwLock<BTreeMap<GridPos, Arc<RegionHandle>>>,
}

impl World {
    /// Builds the world-level map, centered on the world origin. Regions are created by the pipeline.
    pub fn new(settings: Arc<Settings>) -> anyhow::Result<Self> {
        settings.validate()?;
        let region_size = settings.region_size();
        let half_extent = settings.world.width_in_regions as f32 * region_size / 2.0;
        let map = CoordinateMap::new(GridLevelConfig::new(
            WorldPos::new(-half_extent, 0.0, -half_extent),
            settings.world.width_in_regions,
            region_size,
            settings.world.border_offset,
        ))?;
        let seed = seed_from_str(&settings.world.seed);
        Ok(Self {
            settings,
            seed,
            map,
            regions: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn map(&self) -> &CoordinateMap {
        &self.map
    }

    /// Creates one region per world coordinate, replacing any previous set.
    ///
    /// Regions are ordered by position; that order decides which side of a
    /// shared border generates exits first.
    pub fn create_regions(&self) -> usize {
        let g = &self.settings.generation;
        let mut rng = rng_for(self.seed, "regions");
        let positions: BTreeSet<GridPos> = self.map.coordinates().map(|c| c.grid_position()).collect();
        let regions: BTreeMap<GridPos, Arc<RegionHandle>> = positions
            .into_iter()
            .enumerate()
            .map(|(order, pos)| {
                let seed = derive_seed(self.seed, &format!("region {} {}", pos.x, pos.y));
                let ground_height = rng.gen_range(g.min_ground_height..=g.max_ground_height);
                let world_position = self.map.grid_to_world(pos).unwrap_or_default();
                let handle = RegionHandle::new(pos, order, seed, world_position, ground_height);
                (pos, Arc::new(handle))
            })
            .collect();

        let count = regions.len();
        *self.regions.write() = regions;
        info!(regions = count, seed = %self.settings.world.seed, "Created regions");
        count
    }

    pub fn region(&self, pos: GridPos) -> Option<Arc<RegionHandle>> {
        self.regions.read().get(&pos).cloned()
    }

    /// Every region in creation order.
    pub fn regions(&self) -> Vec<Arc<RegionHandle>> {
        self.regions.read().values().cloned().collect()
    }

    /// The region adjacent to `pos` across its `direction` border.
    pub fn neighbor(&self, pos: GridPos, direction: BorderDirection) -> Option<Arc<RegionHandle>> {
        self.region(pos.step(direction))
    }
}
