use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{map::MapConfig, normalize::NormalizeConfig};

/// Every section is optional; a missing file or section means the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub normalize: NormalizeConfig,
    pub ingest: IngestConfig,
    pub map: MapConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    // rows with |lat| and |lon| both below this are GPS "no fix" placeholders;
    // 0 disables the filter
    pub zero_tolerance: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            zero_tolerance: 1e-4,
        }
    }
}

pub fn load(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path).context("Failed to read config")?;
    let config = toml::from_str(&data).context("Failed to parse config")?;
    Ok(config)
}
