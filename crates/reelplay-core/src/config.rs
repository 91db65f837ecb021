//! Player configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Slowest playback speed accepted by [`crate::PlayerHandle::set_speed`]
pub const MIN_SPEED: f32 = 0.25;
/// Fastest playback speed accepted by [`crate::PlayerHandle::set_speed`]
pub const MAX_SPEED: f32 = 4.0;

/// How a failed reachability check (as opposed to a negative answer) is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReachabilityPolicy {
    /// Treat the failed check as "offline" and block playback
    Block,
    /// Treat the failed check as "online" and let the engine try
    AssumeAvailable,
}

/// Player configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Base URL of the catalogue API
    pub api_base_url: String,
    /// Request timeout for API calls in milliseconds
    pub request_timeout_ms: u64,
    /// URL probed by the reachability check
    pub probe_url: String,
    /// Reachability probe timeout in milliseconds
    pub probe_timeout_ms: u64,
    /// Behaviour when the reachability check itself fails
    pub reachability_policy: ReachabilityPolicy,
    /// Advance to the next episode when one ends
    pub auto_advance: bool,
    /// Initial playback speed
    pub default_speed: f32,
    /// Directory for persisted session snapshots (in-memory when unset)
    pub state_dir: Option<PathBuf>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api/".to_string(),
            request_timeout_ms: 10000,
            probe_url: "https://connectivitycheck.gstatic.com/generate_204".to_string(),
            probe_timeout_ms: 3000,
            reachability_policy: ReachabilityPolicy::Block,
            auto_advance: true,
            default_speed: 1.0,
            state_dir: None,
        }
    }
}

impl PlayerConfig {
    /// Load configuration from a JSON file; missing keys take defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: PlayerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and URLs
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(Error::InvalidConfig("request_timeout_ms must be positive".into()));
        }
        if self.probe_timeout_ms == 0 {
            return Err(Error::InvalidConfig("probe_timeout_ms must be positive".into()));
        }
        if !(MIN_SPEED..=MAX_SPEED).contains(&self.default_speed) {
            return Err(Error::InvalidConfig(format!(
                "default_speed {} outside {}..={}",
                self.default_speed, MIN_SPEED, MAX_SPEED
            )));
        }
        Url::parse(&self.api_base_url)
            .map_err(|e| Error::InvalidConfig(format!("api_base_url: {}", e)))?;
        Url::parse(&self.probe_url)
            .map_err(|e| Error::InvalidConfig(format!("probe_url: {}", e)))?;
        Ok(())
    }
}
