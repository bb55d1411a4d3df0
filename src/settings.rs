use anyhow::ensure;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use tessera_grid::ZoneShape;
use tracing::{error, info};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// World-level layout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    /// Seed string every random draw derives from.
    pub seed: String,
    pub width_in_regions: i32,
    pub border_offset: i32,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            seed: "alpha".to_string(),
            width_in_regions: 3,
            border_offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RegionSettings {
    pub width_in_chunks: i32,
    /// Closed rings between the region edge and its playable border.
    pub boundary_offset_in_chunks: i32,
}

impl Default for RegionSettings {
    fn default() -> Self {
        Self {
            width_in_chunks: 11,
            boundary_offset_in_chunks: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChunkSettings {
    pub width_in_cells: i32,
    /// Size of one cell in world units.
    pub cell_size: f32,
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            width_in_cells: 8,
            cell_size: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// 0 gives shortest paths, 1 gives maximal meandering.
    pub path_randomness: f32,
    pub min_zones: usize,
    pub max_zones: usize,
    pub zone_shapes: Vec<ZoneShape>,
    pub min_ground_height: i32,
    pub max_ground_height: i32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            path_randomness: 0.35,
            min_zones: 1,
            max_zones: 3,
            zone_shapes: ZoneShape::ALL.to_vec(),
            min_ground_height: 0,
            max_ground_height: 4,
        }
    }
}

/// Everything generation reads, threaded explicitly from `main` into the world.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub world: WorldSettings,
    pub region: RegionSettings,
    pub chunk: ChunkSettings,
    pub generation: GenerationSettings,
}

impl Settings {
    /// World units along one side of a chunk.
    pub fn chunk_size(&self) -> f32 {
        self.chunk.width_in_cells as f32 * self.chunk.cell_size
    }

    /// World units along one side of a region.
    pub fn region_size(&self) -> f32 {
        self.region.width_in_chunks as f32 * self.chunk_size()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.world.width_in_regions > 0, "world.width_in_regions must be positive");
        ensure!(self.world.border_offset >= 0, "world.border_offset must not be negative");
        ensure!(self.region.width_in_chunks > 0, "region.width_in_chunks must be positive");
        ensure!(
            self.region.boundary_offset_in_chunks >= 0,
            "region.boundary_offset_in_chunks must not be negative"
        );
        ensure!(self.chunk.width_in_cells > 0, "chunk.width_in_cells must be positive");
        ensure!(self.chunk.cell_size > 0.0, "chunk.cell_size must be positive");

        let g = &self.generation;
        ensure!(
            (0.0..=1.0).contains(&g.path_randomness),
            "generation.path_randomness must be within [0, 1], got {}",
            g.path_randomness
        );
        ensure!(
            g.min_zones <= g.max_zones,
            "generation.min_zones ({}) exceeds generation.max_zones ({})",
            g.min_zones,
            g.max_zones
        );
        ensure!(!g.zone_shapes.is_empty(), "generation.zone_shapes must not be empty");
        ensure!(
            g.min_ground_height <= g.max_ground_height,
            "generation.min_ground_height ({}) exceeds generation.max_ground_height ({})",
            g.min_ground_height,
            g.max_ground_height
        );
        Ok(())
    }
}

/// Loads settings from a TOML file, overridden by `TESSERA__SECTION__KEY` environment variables.
///
/// A missing file is not an error; every field has a default.
pub fn load_settings(path: &str) -> Result<Settings, ConfigError> {
    info!("Attempting to load configuration from {}", path);

    let settings = Config::builder()
        .add_source(File::new(path, FileFormat::Toml).required(false))
        .add_source(Environment::with_prefix("TESSERA").prefix_separator("__").separator("__").try_parsing(true))
        .build()
        .and_then(|config| config.try_deserialize::<Settings>());

    match settings {
        Ok(settings) => {
            info!(?settings, "Successfully loaded configuration");
            Ok(settings)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}
