use std::fs;
use std::path::{Path, PathBuf};

use glass_engine::{Color, LoopConfig};
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "GLASS_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    #[serde(rename = "loop")]
    pub loop_config: LoopConfig,
    pub tile_count: usize,
    pub background: Color,
    pub palette: Vec<Color>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            loop_config: LoopConfig::default(),
            tile_count: 4,
            background: Color::rgb(24, 26, 33),
            palette: vec![
                Color::rgb(231, 111, 81),
                Color::rgb(42, 157, 143),
                Color::rgb(233, 196, 106),
                Color::rgb(38, 70, 83),
            ],
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config '{path}' at {at}: {source}")]
    Parse {
        path: PathBuf,
        at: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Loads the config named by `GLASS_CONFIG`, or the defaults when unset.
pub fn load_from_env() -> Result<DemoConfig, ConfigError> {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(path) => load(Path::new(&path)),
        None => Ok(DemoConfig::default()),
    }
}

pub fn load(path: &Path) -> Result<DemoConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&raw).map_err(|(at, source)| ConfigError::Parse {
        path: path.to_path_buf(),
        at,
        source,
    })
}

fn parse(raw: &str) -> Result<DemoConfig, (String, serde_json::Error)> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, DemoConfig>(&mut deserializer).map_err(|error| {
        let at = error.path().to_string();
        (at, error.into_inner())
    })
}
