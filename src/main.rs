mod bus; // event topic shared by the pipeline and its observers
mod pipeline;
mod region;
mod settings;
mod world;

use std::sync::Arc;

use anyhow::Context;
use tessera_grid::CoordinateType;
use tracing::info;
use tracing_subscriber::{self, EnvFilter};

use bus::Topic;
use pipeline::{Pipeline, PipelineEvent};
use settings::{DEFAULT_CONFIG_PATH, load_settings};
use world::World;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let settings = load_settings(&config_path).with_context(|| format!("loading {config_path}"))?;
    let world = Arc::new(World::new(Arc::new(settings))?);

    let events: Topic<PipelineEvent> = Topic::new(32);
    let logger = tokio::spawn(bus::log_messages(events.subscribe()));

    info!("Tessera started. Generating world...");
    let mut pipeline = Pipeline::new(events);
    let result = pipeline.run(&world).await;
    // Dropping the pipeline closes the topic, which ends the logger.
    drop(pipeline);
    let _ = logger.await;
    result?;

    for handle in world.regions() {
        let region = handle.read();
        let Some(map) = region.map() else {
            continue;
        };
        let heights = region.chunks().values().map(|c| c.ground_height());
        let (low, high) = heights.fold((i32::MAX, i32::MIN), |(lo, hi), h| (lo.min(h), hi.max(h)));
        info!(
            region = %handle.position(),
            origin = ?handle.world_position(),
            ground_height = handle.ground_height(),
            chunk_heights = %format!("{low}..={high}"),
            exits = map.count_of(CoordinateType::Exit),
            paths = map.paths().len(),
            zones = map.zones().len(),
            "Region generated"
        );
        println!("Region {}:\n{}", handle.position(), map);
    }
    Ok(())
}
