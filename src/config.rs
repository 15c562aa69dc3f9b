use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub stream: StreamConfig,
    pub logging: Option<LoggingConfig>,
}

/// Tunables of the streaming engine. Defaults match production behavior;
/// tests shrink the intervals so loops can be driven quickly.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StreamConfig {
    /// Playback-seconds worth of bytes fetched per range request.
    pub chunk_secs: u64,
    /// Keep-alive re-arm interval of the range-fetch loop, in seconds.
    pub keepalive_secs: u64,
    /// How often a live session re-resolves its signed manifest URL, in seconds.
    pub manifest_refresh_secs: u64,
    /// How often the HLS variant re-parses its playlist, in seconds.
    pub playlist_refresh_secs: u64,
    /// Playback-seconds of HLS segments buffered per refresh cycle.
    pub playlist_cap_secs: f64,
    /// Number of recent live segments fetched before entering steady state.
    pub live_precache: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_secs: 300,
            keepalive_secs: 265,
            manifest_refresh_secs: 1800,
            playlist_refresh_secs: 280,
            playlist_cap_secs: 300.0,
            live_precache: 3,
        }
    }
}

impl StreamConfig {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    pub fn manifest_refresh(&self) -> Duration {
        Duration::from_secs(self.manifest_refresh_secs)
    }

    pub fn playlist_refresh(&self) -> Duration {
        Duration::from_secs(self.playlist_refresh_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub filters: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_str = std::fs::read_to_string("config.toml").unwrap_or_else(|_| "".to_string());
        if config_str.is_empty() {
            return Ok(Self::default());
        }
        let config: Config = toml::from_str(&config_str)?;
        Ok(config)
    }
}
