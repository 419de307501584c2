//! Player configuration.
//!
//! Priority: ENV vars (REELVIEW_CACHE_CAPACITY, REELVIEW_AUTO_REPLAY) → JSON file → defaults

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::asset_cache::DEFAULT_CAPACITY;
use crate::core::types::BufferingHints;

pub const ENV_CACHE_CAPACITY: &str = "REELVIEW_CACHE_CAPACITY";
pub const ENV_AUTO_REPLAY: &str = "REELVIEW_AUTO_REPLAY";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Maximum cached assets (process-wide cache)
    pub cache_capacity: usize,
    /// Restart from the beginning after reaching the end
    pub auto_replay: bool,
    pub buffering: BufferingHints,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CAPACITY,
            auto_replay: true,
            buffering: BufferingHints::default(),
        }
    }
}

impl PlayerConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write config: {}", path.display()))
    }

    /// Defaults, overlaid by `path` if given, overlaid by the environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    /// Apply overrides from `lookup` (normally `std::env::var`).
    /// Unparseable values are ignored with a warning.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(ENV_CACHE_CAPACITY) {
            match raw.trim().parse::<usize>() {
                Ok(n) => self.cache_capacity = n,
                Err(_) => warn!("Ignoring {}={:?}: not a count", ENV_CACHE_CAPACITY, raw),
            }
        }
        if let Some(raw) = lookup(ENV_AUTO_REPLAY) {
            match parse_flag(&raw) {
                Some(b) => self.auto_replay = b,
                None => warn!("Ignoring {}={:?}: not a flag", ENV_AUTO_REPLAY, raw),
            }
        }
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
