//! Staged world generation.
//!
//! Stages run strictly one after another. Within a stage every region gets its
//! own task ("bot") and the stage only completes once all of them have joined.
//! Exit generation is the one stage with cross-region ordering: a region waits
//! on the readiness signal of every earlier neighbor before mirroring its exits.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use tessera_grid::{BorderDirection, GridPos};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::bus::Topic;
use crate::region::{RegionHandle, RegionProgress};
use crate::world::World;

/// One step of world generation, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    CreateRegions,
    InitializeRegions,
    GenerateExits,
    GeneratePaths,
    GenerateZones,
    AssignHeights,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::CreateRegions,
        Stage::InitializeRegions,
        Stage::GenerateExits,
        Stage::GeneratePaths,
        Stage::GenerateZones,
        Stage::AssignHeights,
    ];

    /// Progress every region must have before this stage runs.
    fn requires(self) -> Option<RegionProgress> {
        match self {
            Stage::CreateRegions => None,
            Stage::InitializeRegions => Some(RegionProgress::Created),
            Stage::GenerateExits => Some(RegionProgress::MapInitialized),
            Stage::GeneratePaths => Some(RegionProgress::ExitsGenerated),
            Stage::GenerateZones => Some(RegionProgress::PathsGenerated),
            Stage::AssignHeights => Some(RegionProgress::ZonesGenerated),
        }
    }

    /// Progress a region has once this stage's bot finishes.
    fn produces(self) -> RegionProgress {
        match self {
            Stage::CreateRegions => RegionProgress::Created,
            Stage::InitializeRegions => RegionProgress::MapInitialized,
            Stage::GenerateExits => RegionProgress::ExitsGenerated,
            Stage::GeneratePaths => RegionProgress::PathsGenerated,
            Stage::GenerateZones => RegionProgress::ZonesGenerated,
            Stage::AssignHeights => RegionProgress::HeightsAssigned,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Where a stage is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageState {
    Pending,
    Running,
    Completed,
    /// Carries the error that stopped the stage.
    Failed(String),
}

/// A stage state transition, published on the pipeline's event topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineEvent {
    pub stage: Stage,
    pub state: StageState,
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            StageState::Failed(reason) => write!(f, "Stage {} failed: {}", self.stage, reason),
            state => write!(f, "Stage {} {:?}", self.stage, state),
        }
    }
}

/// Queue of stages run in order against a world. No stage is retried; the
/// first failure halts the queue.
pub struct Pipeline {
    queue: VecDeque<Stage>,
    states: BTreeMap<Stage, StageState>,
    events: Topic<PipelineEvent>,
}

impl Pipeline {
    pub fn new(events: Topic<PipelineEvent>) -> Self {
        Self::starting_at(Stage::CreateRegions, events)
    }

    /// A pipeline that re-runs `first` and every later stage.
    ///
    /// Each stage clears its own prior output, so restarting from any stage of
    /// an already generated world reproduces the same result.
    pub fn starting_at(first: Stage, events: Topic<PipelineEvent>) -> Self {
        let queue: VecDeque<Stage> = Stage::ALL.into_iter().filter(|s| *s >= first).collect();
        let states = queue.iter().map(|s| (*s, StageState::Pending)).collect();
        Self { queue, states, events }
    }

    pub fn state(&self, stage: Stage) -> Option<&StageState> {
        self.states.get(&stage)
    }

    /// Runs every queued stage to completion.
    pub async fn run(&mut self, world: &Arc<World>) -> anyhow::Result<()> {
        while let Some(stage) = self.queue.pop_front() {
            self.transition(stage, StageState::Running);
            info!(%stage, "Stage started");

            match run_stage(stage, world).await {
                Ok(()) => {
                    self.transition(stage, StageState::Completed);
                    info!(%stage, "Stage completed");
                }
                Err(e) => {
                    error!(%stage, "Stage failed: {:#}", e);
                    self.transition(stage, StageState::Failed(format!("{e:#}")));
                    self.queue.clear();
                    return Err(e.context(format!("pipeline halted at stage {stage}")));
                }
            }
        }
        Ok(())
    }

    fn transition(&mut self, stage: Stage, state: StageState) {
        self.states.insert(stage, state.clone());
        self.events.publish(PipelineEvent { stage, state });
    }
}

async fn run_stage(stage: Stage, world: &Arc<World>) -> anyhow::Result<()> {
    if stage == Stage::CreateRegions {
        world.create_regions();
        return Ok(());
    }

    let regions = world.regions();
    if regions.is_empty() {
        bail!("no regions exist; run {} first", Stage::CreateRegions);
    }
    if let Some(required) = stage.requires() {
        for region in &regions {
            let progress = region.progress();
            if progress != RegionProgress::Failed && progress < required {
                bail!("region {} is at {:?}, {} needs {:?}", region.position(), progress, stage, required);
            }
        }
        // Rewind so waits in this stage see this run's signals, not a previous run's.
        for region in &regions {
            region.set_progress(required);
        }
    }

    let mut bots = JoinSet::new();
    for region in regions {
        let world = Arc::clone(world);
        bots.spawn(async move {
            let result = run_bot(stage, &world, &region).await;
            match &result {
                Ok(()) => region.set_progress(stage.produces()),
                Err(_) => region.set_progress(RegionProgress::Failed),
            }
            result.with_context(|| format!("region {}", region.position()))
        });
    }

    // Hard join: every bot finishes before the stage is judged.
    let mut first_error = None;
    while let Some(joined) = bots.join_next().await {
        let result = joined.map_err(|e| anyhow!("region bot panicked: {e}")).and_then(|r| r);
        if let Err(e) = result {
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

async fn run_bot(stage: Stage, world: &World, region: &RegionHandle) -> anyhow::Result<()> {
    let settings = world.settings();
    match stage {
        Stage::CreateRegions => Ok(()),
        Stage::InitializeRegions => region.initialize(settings),
        Stage::GenerateExits => {
            let mut neighbors: BTreeMap<BorderDirection, Option<(usize, Vec<GridPos>)>> = BTreeMap::new();
            for direction in BorderDirection::ALL {
                let entry = match world.neighbor(region.position(), direction) {
                    Some(neighbor) if neighbor.order() < region.order() => {
                        neighbor.reached(RegionProgress::ExitsGenerated).await?;
                        let exits: Vec<GridPos> = neighbor
                            .read()
                            .map()
                            .map(|m| m.exits_on(direction.opposite()).collect())
                            .unwrap_or_default();
                        Some((neighbor.order(), exits))
                    }
                    Some(neighbor) => Some((neighbor.order(), Vec::new())),
                    None => None,
                };
                neighbors.insert(direction, entry);
            }
            let exits = region.generate_necessary_exits(&neighbors)?;
            debug!(region = %region.position(), exits, "Exits bot finished");
            Ok(())
        }
        Stage::GeneratePaths => region.generate_paths().map(|_| ()),
        Stage::GenerateZones => region.generate_zones(settings).map(|_| ()),
        Stage::AssignHeights => {
            let neighbor_heights: BTreeMap<BorderDirection, i32> = BorderDirection::ALL
                .into_iter()
                .filter_map(|d| world.neighbor(region.position(), d).map(|n| (d, n.ground_height())))
                .collect();
            region.assign_heights(&neighbor_heights)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use crate::settings::Settings;
    use tessera_grid::{CoordinateMap, CoordinateType, Path};

    fn small_settings(seed: &str) -> Settings {
        let mut s = Settings::default();
        s.world.seed = seed.to_string();
        s.region.width_in_chunks = 9;
        s.chunk.width_in_cells = 4;
        s
    }

    async fn generate(settings: Settings) -> Arc<World> {
        let world = Arc::new(World::new(Arc::new(settings)).unwrap());
        Pipeline::new(Topic::new(32)).run(&world).await.unwrap();
        world
    }

    /// Text rendering of every region map, chunk height and chunk cell map.
    fn snapshot(world: &World) -> String {
        let mut out = String::new();
        for handle in world.regions() {
            let region = handle.read();
            out.push_str(&format!("{}\n{}", handle.position(), region.map().unwrap()));
            for chunk in region.chunks().values() {
                out.push_str(&format!("{} {}\n{}", chunk.grid_position(), chunk.ground_height(), chunk.cells()));
            }
        }
        out
    }

    #[tokio::test]
    async fn test_full_run() {
        let world = generate(small_settings("alpha")).await;
        let regions = world.regions();
        assert_eq!(regions.len(), 9);
        for handle in &regions {
            assert_eq!(handle.progress(), RegionProgress::HeightsAssigned);
            let region = handle.read();
            let map = region.map().unwrap();
            assert_eq!(region.chunks().len(), 81);
            // Paths only ever chain existing exits.
            let exits = map.count_of(CoordinateType::Exit);
            assert!(map.paths().len() <= exits.saturating_sub(1));
        }
    }

    #[tokio::test]
    async fn test_exits_match_across_shared_borders() {
        let world = generate(small_settings("alpha")).await;
        let mut shared = 0;
        for handle in world.regions() {
            for direction in BorderDirection::ALL {
                let Some(neighbor) = world.neighbor(handle.position(), direction) else {
                    continue;
                };
                let here = handle.read();
                let there = neighbor.read();
                let mine: Vec<i32> = here
                    .map()
                    .unwrap()
                    .exits_on(direction)
                    .map(|p| direction.lateral(p))
                    .collect();
                let theirs: Vec<i32> = there
                    .map()
                    .unwrap()
                    .exits_on(direction.opposite())
                    .map(|p| direction.lateral(p))
                    .collect();
                assert_eq!(mine, theirs, "{} {} border", handle.position(), direction);
                shared += mine.len();

                // Both sides of each exit sit at the same height.
                for exit in here.map().unwrap().exits_on(direction) {
                    let mirror = there
                        .map()
                        .unwrap()
                        .exits_on(direction.opposite())
                        .find(|p| direction.lateral(*p) == direction.lateral(exit))
                        .unwrap();
                    assert_eq!(here.chunks()[&exit].ground_height(), there.chunks()[&mirror].ground_height());
                }
            }
        }
        assert!(shared > 0, "a 3x3 world should have at least one shared exit");
    }

    #[tokio::test]
    async fn test_world_edges_are_closed() {
        let world = generate(small_settings("alpha")).await;
        let corner = world.region(GridPos::new(0, 0)).unwrap();
        let region = corner.read();
        let map = region.map().unwrap();
        assert!(map.is_border_active(BorderDirection::West));
        assert!(map.is_border_active(BorderDirection::South));
        assert!(!map.is_border_active(BorderDirection::North));
        assert_eq!(map.exits_on(BorderDirection::West).count(), 0);
        for pos in map.border_positions(BorderDirection::South) {
            assert_eq!(map.type_at(pos), Some(CoordinateType::Closed));
        }
    }

    #[tokio::test]
    async fn test_generation_is_deterministic() {
        let a = generate(small_settings("alpha")).await;
        let b = generate(small_settings("alpha")).await;
        assert_eq!(snapshot(&a), snapshot(&b));

        let c = generate(small_settings("beta")).await;
        assert_ne!(snapshot(&a), snapshot(&c));
    }

    #[tokio::test]
    async fn test_restart_from_stage_reproduces_world() {
        let world = generate(small_settings("alpha")).await;
        let full = snapshot(&world);

        for stage in [Stage::GenerateExits, Stage::GeneratePaths, Stage::AssignHeights] {
            Pipeline::starting_at(stage, Topic::new(32)).run(&world).await.unwrap();
            assert_eq!(snapshot(&world), full, "restart from {stage}");
        }
    }

    #[tokio::test]
    async fn test_restart_needs_regions() {
        let world = Arc::new(World::new(Arc::new(small_settings("alpha"))).unwrap());
        let mut pipeline = Pipeline::starting_at(Stage::GeneratePaths, Topic::new(32));
        assert!(pipeline.run(&world).await.is_err());
        assert!(matches!(pipeline.state(Stage::GeneratePaths), Some(StageState::Failed(_))));
        assert_eq!(pipeline.state(Stage::GenerateZones), Some(&StageState::Pending));
        assert_eq!(pipeline.state(Stage::InitializeRegions), None);
    }

    #[tokio::test]
    async fn test_stage_out_of_order_fails() {
        let world = Arc::new(World::new(Arc::new(small_settings("alpha"))).unwrap());
        world.create_regions();
        // Regions exist but have no maps yet.
        let mut pipeline = Pipeline::starting_at(Stage::GenerateExits, Topic::new(32));
        assert!(pipeline.run(&world).await.is_err());
    }

    #[tokio::test]
    async fn test_events_in_stage_order() {
        let world = Arc::new(World::new(Arc::new(small_settings("alpha"))).unwrap());
        let events = Topic::new(32);
        let mut rx = events.subscribe();
        Pipeline::new(events).run(&world).await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push((*event).clone());
        }
        let expected: Vec<PipelineEvent> = Stage::ALL
            .into_iter()
            .flat_map(|stage| {
                [
                    PipelineEvent { stage, state: StageState::Running },
                    PipelineEvent { stage, state: StageState::Completed },
                ]
            })
            .collect();
        assert_eq!(seen, expected);
    }

    /// Every position is in exactly one type bucket and the buckets agree with the grid.
    fn assert_partition(map: &CoordinateMap) {
        let mut seen = BTreeSet::new();
        for t in CoordinateType::ALL {
            for pos in map.positions_of(t) {
                assert!(seen.insert(pos), "{pos} is in more than one type bucket");
                assert_eq!(map.type_at(pos), Some(t));
            }
        }
        assert_eq!(seen.len(), (map.width() * map.width()) as usize);
    }

    fn assert_route(path: &Path) {
        assert_eq!(path.positions().first(), Some(&path.start()));
        assert_eq!(path.positions().last(), Some(&path.end()));
        for pair in path.positions().windows(2) {
            assert_eq!(pair[0].manhattan(pair[1]), 1, "{} and {} are not adjacent", pair[0], pair[1]);
        }
        let unique: BTreeSet<GridPos> = path.positions().iter().copied().collect();
        assert_eq!(unique.len(), path.len(), "path revisits a position");
    }

    #[tokio::test]
    async fn test_generated_maps_and_paths_are_well_formed() {
        for seed in ["alpha", "beta", "gamma"] {
            for offset in [0, 1] {
                for randomness in [0.0, 1.0] {
                    let mut settings = small_settings(seed);
                    settings.region.boundary_offset_in_chunks = offset;
                    settings.generation.path_randomness = randomness;
                    let world = generate(settings).await;

                    for handle in world.regions() {
                        let region = handle.read();
                        let map = region.map().unwrap();
                        assert_partition(map);
                        for chunk in region.chunks().values() {
                            assert_partition(chunk.cells());
                        }

                        // Without paths and zones the map is back to what the exit chain was planned on.
                        let mut before = map.clone();
                        before.clear_paths();
                        for path in map.paths() {
                            assert_route(path);
                            assert_eq!(before.type_at(path.start()), Some(CoordinateType::Exit));
                            assert_eq!(before.type_at(path.end()), Some(CoordinateType::Exit));
                            for pos in &path.positions()[1..path.len() - 1] {
                                let t = before.type_at(*pos).unwrap();
                                assert!(path.allowed_types().contains(&t), "{pos} was {t}");
                                assert_eq!(map.type_at(*pos), Some(CoordinateType::Path));
                            }
                        }

                        for zone in map.zones() {
                            let Some(path) = zone.connection() else {
                                continue;
                            };
                            assert_route(path);
                            assert!(zone.members().contains(&path.start()));
                            for pos in path.positions() {
                                assert_eq!(map.type_at(*pos), Some(CoordinateType::Path));
                            }
                            for (pos, previous) in zone.connection_overwrote() {
                                assert!(path.contains(*pos));
                                assert!(path.allowed_types().contains(previous), "{pos} was {previous}");
                            }
                        }
                        let connected = map.zones().iter().filter(|z| z.connection().is_some()).count();
                        assert_eq!(map.all_paths().count(), map.paths().len() + connected);
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn test_exit_chunks_open_onto_neighbor() {
        let world = generate(small_settings("alpha")).await;
        let mut doorways = 0;
        for handle in world.regions() {
            let region = handle.read();
            let map = region.map().unwrap();
            for direction in BorderDirection::ALL {
                for exit in map.exits_on(direction) {
                    assert!(
                        !region.chunks()[&exit].cells().is_border_active(direction),
                        "exit {exit} of {} is walled toward its {direction} neighbor",
                        handle.position()
                    );
                    doorways += 1;
                }
                if world.neighbor(handle.position(), direction).is_none() {
                    for pos in map.border_positions(direction) {
                        assert!(region.chunks()[&pos].cells().is_border_active(direction));
                    }
                }
            }
        }
        assert!(doorways > 0);
    }
}
