// ABOUTME: Configuration management for the loopscope application
// ABOUTME: Handles loading configuration from files and environment variables

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::{AnimationTimings, EngineConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_speed")]
    pub speed: f64,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub animation: AnimationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    pub active_poll_ms: u64,
    pub paused_poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationConfig {
    pub transit_ms: u64,
    pub dispatcher_dwell_ms: u64,
    pub settle_ms: u64,
    pub fade_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

fn default_speed() -> f64 {
    1.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            timing: TimingConfig::default(),
            animation: AnimationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            active_poll_ms: 50,
            paused_poll_ms: 100,
        }
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            transit_ms: 500,
            dispatcher_dwell_ms: 300,
            settle_ms: 50,
            fade_ms: 300,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => Self::find_config_file(),
        };

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            serde_yaml::from_str(&contents)?
        } else {
            Config::default()
        };

        config.merge_env()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> PathBuf {
        let possible_paths = [
            PathBuf::from("loopscope.yaml"),
            PathBuf::from("loopscope.yml"),
            PathBuf::from(".loopscope.yaml"),
            PathBuf::from(".loopscope.yml"),
        ];

        for path in possible_paths {
            if path.exists() {
                return path;
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".loopscope").join("config.yaml");
            if home_config.exists() {
                return home_config;
            }
        }

        // Default path, may not exist
        PathBuf::from("loopscope.yaml")
    }

    /// Merge environment variables into configuration
    fn merge_env(&mut self) -> Result<()> {
        if let Ok(speed) = std::env::var("LOOPSCOPE_SPEED") {
            self.speed = speed.trim().parse()?;
        }
        if let Ok(level) = std::env::var("LOOPSCOPE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOOPSCOPE_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            speed: self.speed,
            active_poll: Duration::from_millis(self.timing.active_poll_ms.max(1)),
            paused_poll: Duration::from_millis(self.timing.paused_poll_ms.max(1)),
            animation: AnimationTimings {
                transit: Duration::from_millis(self.animation.transit_ms),
                dispatcher_dwell: Duration::from_millis(self.animation.dispatcher_dwell_ms),
                settle: Duration::from_millis(self.animation.settle_ms),
                fade: Duration::from_millis(self.animation.fade_ms),
            },
        }
    }
}
