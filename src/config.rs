use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;

use crate::engine::{CrossingEngine, ExitPolicy};
use crate::geometry::{FootprintMode, DEFAULT_FOOTPRINT_SCALE};
use crate::region::{RegionConfig, RegionSet};
use crate::report::ObjectKind;

fn default_footprint_scale() -> f64 {
    DEFAULT_FOOTPRINT_SCALE
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub fps: f64,
    #[serde(default = "default_footprint_scale")]
    pub footprint_scale: f64,
    #[serde(default)]
    pub footprint: FootprintMode,
    #[serde(default)]
    pub object_kind: ObjectKind,
    #[serde(default)]
    pub exit_policy: ExitPolicy,
    #[serde(default)]
    pub max_idle_detections: Option<u64>,
    pub regions: Vec<RegionConfig>,
}

impl Config {
    /// Load from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&data).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn from_json(data: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_json::from_str(data)?;
        Ok(cfg)
    }

    pub fn region_set(&self) -> crate::Result<RegionSet> {
        RegionSet::build(self.regions.iter().cloned())
    }

    /// Build an engine over a region set that may be shared with other engines.
    pub fn engine_for(&self, regions: Arc<RegionSet>) -> crate::Result<CrossingEngine> {
        Ok(CrossingEngine::new(regions, self.fps, self.footprint_scale)?
            .with_footprint_mode(self.footprint)
            .with_exit_policy(self.exit_policy)
            .with_retention(self.max_idle_detections))
    }

    pub fn build_engine(&self) -> crate::Result<CrossingEngine> {
        self.engine_for(Arc::new(self.region_set()?))
    }
}
