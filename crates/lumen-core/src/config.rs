//! Runtime configuration (YAML).

use crate::geometry::Homography;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Floor for polling and tick intervals; zero would make those loops spin.
pub const MIN_LOOP_INTERVAL_MS: u64 = 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub tracking: TrackingConfig,
    pub selection: SelectionConfig,
    pub presence: PresenceConfig,
    pub rules: RulesConfig,
    pub actions: ActionsConfig,
    pub timers: TimersConfig,
    pub projection: ProjectionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// How long the selection detector waits on the marker mailbox per tick.
    pub interval_ms: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self { interval_ms: 50 }
    }
}

impl TrackingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(MIN_LOOP_INTERVAL_MS))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Continuous collision needed before a Selection fires.
    pub trigger_interval_ms: u64,
    /// Re-fire period for repeatable kinds while the collision persists.
    pub repeat_interval_ms: u64,
    /// Continuous collision needed before a HandOnTop fires.
    pub hand_on_top_trigger_interval_ms: u64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            trigger_interval_ms: 200,
            repeat_interval_ms: 1000,
            hand_on_top_trigger_interval_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    pub min_interval_appear_ms: u64,
    pub min_interval_disappear_ms: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            min_interval_appear_ms: 1000,
            min_interval_disappear_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Pause before running a rule triggered by SceneShown.
    pub scene_shown_delay_ms: u64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self { scene_shown_delay_ms: 600 }
    }
}

/// What happens to composite actions still running when the scene changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeCancellation {
    /// Keep running, even against a scene that is no longer shown.
    #[default]
    RunToCompletion,
    /// Skip remaining sub-actions once the scene has changed.
    CancelOnSceneChange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    pub composite_cancellation: CompositeCancellation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimersConfig {
    pub tick_interval_ms: u64,
}

impl Default for TimersConfig {
    fn default() -> Self {
        Self { tick_interval_ms: 1000 }
    }
}

impl TimersConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(MIN_LOOP_INTERVAL_MS))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Camera → scene transform. Identity when unset.
    pub homography: Option<Homography>,
}

/// Default config directory for lumen.
pub fn config_dir() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lumen")
}

/// Default runtime config file path.
pub fn default_config_path() -> PathBuf {
    config_dir().join("runtime.yaml")
}

pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<RuntimeConfig> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let config = serde_yaml::from_str(&content)?;
    debug!(path = ?path.as_ref(), "Loaded runtime config");
    Ok(config)
}

/// Load a config, falling back to defaults if it is missing or invalid.
pub fn load_or_default(path: impl AsRef<Path>) -> RuntimeConfig {
    let path = path.as_ref();
    if !path.exists() {
        debug!(?path, "No runtime config found, using defaults");
        return RuntimeConfig::default();
    }
    match load_config(path) {
        Ok(config) => {
            info!(?path, "Loaded runtime config");
            config
        }
        Err(e) => {
            warn!(?path, "Failed to load runtime config: {}, using defaults", e);
            RuntimeConfig::default()
        }
    }
}

pub fn save_config(path: impl AsRef<Path>, config: &RuntimeConfig) -> ConfigResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_yaml::to_string(config)?)?;
    info!(?path, "Saved runtime config");
    Ok(())
}
