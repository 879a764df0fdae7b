//! notegraph
//!
//! Client-side knowledge store for a personal knowledge base:
//! - Notes, hierarchical categories, typed links and canvas positions kept
//!   consistent under optimistic mutation
//! - Deterministic graph edge layout for multi-links between notes
//! - Debounced position persistence with circular auto-layout
//! - An abstract async persistence backend, with an in-memory implementation

pub mod backend;
pub mod coordinator;
pub mod edges;
pub mod error;
pub mod events;
pub mod layout;
pub mod models;
pub mod store;
pub mod sync;
pub mod view;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use coordinator::{KnowledgeStore, Outcome};
pub use error::StoreError;

use anyhow::Result;
use layout::LayoutConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub sync: SyncYamlConfig,
    pub layout: LayoutConfig,
    pub data: DataYamlConfig,
}

/// Position sync section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncYamlConfig {
    /// Quiet period after the last unsettled report before writing
    pub debounce_ms: u64,
}

impl Default for SyncYamlConfig {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}

/// Data section
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DataYamlConfig {
    /// JSON snapshot loaded by the CLI when no path is given
    pub snapshot_path: Option<String>,
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub debounce: Duration,
    pub layout: LayoutConfig,
    pub snapshot_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_yaml(YamlConfig::default())
    }
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "notegraph.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);
        let mut config = Self::from_yaml(yaml);

        if let Some(ms) = env_parse::<u64>("NOTEGRAPH_DEBOUNCE_MS") {
            config.debounce = Duration::from_millis(ms);
        }
        if let Some(v) = env_parse("NOTEGRAPH_CENTER_X") {
            config.layout.center_x = v;
        }
        if let Some(v) = env_parse("NOTEGRAPH_CENTER_Y") {
            config.layout.center_y = v;
        }
        if let Some(v) = env_parse("NOTEGRAPH_BASE_RADIUS") {
            config.layout.base_radius = v;
        }
        if let Some(v) = env_parse("NOTEGRAPH_RADIUS_PER_NODE") {
            config.layout.radius_per_node = v;
        }
        if let Some(v) = env_parse("NOTEGRAPH_SEED_SPACING") {
            config.layout.seed_spacing = v;
        }
        if let Some(v) = env_parse("NOTEGRAPH_SEED_COLUMNS") {
            config.layout.seed_columns = v;
        }
        if let Ok(path) = std::env::var("NOTEGRAPH_SNAPSHOT") {
            config.snapshot_path = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        Self {
            debounce: Duration::from_millis(yaml.sync.debounce_ms),
            layout: yaml.layout,
            snapshot_path: yaml.data.snapshot_path.map(PathBuf::from),
        }
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("notegraph.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

/// Parse an env var, ignoring it when unset or malformed
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring malformed {}={}", name, raw);
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
