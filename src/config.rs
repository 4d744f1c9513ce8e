//! Playback configuration
//!
//! Timing constants and the background asset set. Every field has a default,
//! so a config file only needs the values it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackConfig {
    /// Seconds to answer each question
    pub countdown_secs: u32,

    /// How long the result stays on screen before moving on
    pub reveal_delay_ms: u64,

    /// Duration of each half of the background crossfade
    pub fade_duration_ms: u64,

    /// Pause after a new background has faded in, before content appears
    pub settle_delay_ms: u64,

    /// Delay between consecutive option cards animating in
    pub option_stagger_ms: u64,

    /// Timer turns to "warning" at or below this many seconds
    pub warning_threshold_secs: u32,

    /// Timer turns to "danger" at or below this many seconds
    pub danger_threshold_secs: u32,

    /// Background assets, used cyclically per question
    pub backgrounds: Vec<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 10,
            reveal_delay_ms: 2000,
            fade_duration_ms: 600,
            settle_delay_ms: 800,
            option_stagger_ms: 400,
            warning_threshold_secs: 5,
            danger_threshold_secs: 3,
            backgrounds: (1..=4).map(|i| format!("background{i}.mp4")).collect(),
        }
    }
}

impl PlaybackConfig {
    /// Load a config file, filling missing fields with defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Loaded playback config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.countdown_secs == 0 {
            return Err(ConfigError::Invalid(
                "countdownSecs must be at least 1".to_string(),
            ));
        }
        if self.backgrounds.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one background is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }

    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_duration_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
