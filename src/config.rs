//! Client configuration
//!
//! Settings are plain serde structs with defaults for every field, so a
//! YAML file only needs the values it changes:
//!
//! ```yaml
//! ws_base: wss://monitor.example.com
//! api_base: https://monitor.example.com
//! reconnect_delay_ms: 2000
//! backoff: exponential
//! ```
//!
//! Durations are given in milliseconds.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::types::StreamKey;
use crate::{Result, StreamError};

/// Default heartbeat period while connected
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;
/// Default delay before a reconnect attempt
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;
/// Default cap on consecutive reconnect attempts
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
/// Default render refresh rate
pub const DEFAULT_REFRESH_RATE_HZ: f64 = 60.0;

/// How the delay between reconnect attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffPolicy {
    /// Same delay before every attempt
    #[default]
    Fixed,
    /// Delay doubles per attempt up to `max_reconnect_delay_ms`
    Exponential,
}

/// Configuration shared by all streams of one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// WebSocket base URL; streams live under `/ws/video/{key}`
    pub ws_base: String,
    /// HTTP base URL of the settings API
    pub api_base: String,
    pub heartbeat_interval_ms: u64,
    pub reconnect_delay_ms: u64,
    /// Upper bound for exponential backoff
    pub max_reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub backoff: BackoffPolicy,
    /// Render ticks per second
    pub refresh_rate_hz: f64,
    /// Binary messages above this size are rejected before decode
    pub max_frame_bytes: usize,
    /// Buffered events per subscriber before slow subscribers lag
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_base: "ws://localhost:8000".to_string(),
            api_base: "http://localhost:8000".to_string(),
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            max_reconnect_delay_ms: 60_000,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            backoff: BackoffPolicy::Fixed,
            refresh_rate_hz: DEFAULT_REFRESH_RATE_HZ,
            max_frame_bytes: 16 * 1024 * 1024,
            event_capacity: 64,
        }
    }
}

impl ClientConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: ClientConfig = serde_yaml_ng::from_str(yaml)
            .map_err(|e| StreamError::invalid_config("yaml", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| StreamError::file_error(path.to_path_buf(), e))?;
        debug!("Loaded client configuration from {}", path.display());
        Self::from_yaml_str(&yaml)
    }

    /// Check every field for a usable value.
    pub fn validate(&self) -> Result<()> {
        let ws = parse_base("ws_base", &self.ws_base)?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            return Err(StreamError::invalid_config(
                "ws_base",
                format!("scheme must be ws or wss, got {}", ws.scheme()),
            ));
        }

        let api = parse_base("api_base", &self.api_base)?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(StreamError::invalid_config(
                "api_base",
                format!("scheme must be http or https, got {}", api.scheme()),
            ));
        }

        if self.heartbeat_interval_ms == 0 {
            return Err(StreamError::invalid_config("heartbeat_interval_ms", "must be positive"));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(StreamError::invalid_config("reconnect_delay_ms", "must be positive"));
        }
        if self.max_reconnect_delay_ms < self.reconnect_delay_ms {
            return Err(StreamError::invalid_config(
                "max_reconnect_delay_ms",
                "must not be below reconnect_delay_ms",
            ));
        }
        if !(self.refresh_rate_hz > 0.0 && self.refresh_rate_hz <= 1000.0) {
            return Err(StreamError::invalid_config(
                "refresh_rate_hz",
                format!("must be in (0, 1000], got {}", self.refresh_rate_hz),
            ));
        }
        if self.max_frame_bytes == 0 {
            return Err(StreamError::invalid_config("max_frame_bytes", "must be positive"));
        }
        if self.event_capacity == 0 {
            return Err(StreamError::invalid_config("event_capacity", "must be positive"));
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Period of one render tick
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.refresh_rate_hz)
    }

    /// Delay before reconnect attempt number `attempt` (1-based)
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let base = self.reconnect_delay_ms;
        let delay_ms = match self.backoff {
            BackoffPolicy::Fixed => base,
            BackoffPolicy::Exponential => {
                let shift = attempt.saturating_sub(1).min(20);
                base.saturating_mul(1u64 << shift).min(self.max_reconnect_delay_ms)
            }
        };
        Duration::from_millis(delay_ms)
    }

    /// Socket endpoint of one stream
    pub fn stream_endpoint(&self, key: &StreamKey) -> Result<Url> {
        join_segments("ws_base", &self.ws_base, &["ws", "video", key.as_str()])
    }

    /// Settings endpoint of one stream
    pub fn settings_endpoint(&self, key: &StreamKey) -> Result<Url> {
        join_segments("api_base", &self.api_base, &["api", "video-streams", key.as_str(), "config"])
    }
}

fn parse_base(field: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| StreamError::invalid_config(field, format!("{value}: {e}")))
}

fn join_segments(field: &str, base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = parse_base(field, base)?;
    url.path_segments_mut()
        .map_err(|_| StreamError::invalid_config(field, "URL cannot carry a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behavior() {
        let config = ClientConfig::default();
        config.validate().unwrap();
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(config.reconnect_delay(1), Duration::from_secs(5));
        assert_eq!(config.reconnect_delay(9), Duration::from_secs(5));
        assert_eq!(config.max_reconnect_attempts, 10);
    }

    #[test]
    fn yaml_overrides_only_given_fields() {
        let config = ClientConfig::from_yaml_str(
            "ws_base: wss://monitor.example.com/base\nmax_reconnect_attempts: 3\n",
        )
        .unwrap();
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.reconnect_delay_ms, DEFAULT_RECONNECT_DELAY_MS);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = ClientConfig::from_yaml_str("reconect_delay_ms: 10\n").unwrap_err();
        assert!(matches!(err, StreamError::InvalidConfig { .. }));
    }

    #[test]
    fn invalid_values_name_their_field() {
        let cases = [
            ("ws_base: http://x\n", "ws_base"),
            ("api_base: ws://x\n", "api_base"),
            ("heartbeat_interval_ms: 0\n", "heartbeat_interval_ms"),
            ("refresh_rate_hz: 0\n", "refresh_rate_hz"),
            ("reconnect_delay_ms: 10\nmax_reconnect_delay_ms: 5\n", "max_reconnect_delay_ms"),
        ];
        for (yaml, field) in cases {
            match ClientConfig::from_yaml_str(yaml) {
                Err(StreamError::InvalidConfig { field: f, .. }) => assert_eq!(f, field, "{yaml}"),
                other => panic!("expected InvalidConfig for {yaml:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let config = ClientConfig {
            backoff: BackoffPolicy::Exponential,
            reconnect_delay_ms: 1_000,
            max_reconnect_delay_ms: 5_000,
            ..Default::default()
        };
        let delays: Vec<u64> =
            (1..=5).map(|a| config.reconnect_delay(a).as_millis() as u64).collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 5_000, 5_000]);
    }

    #[test]
    fn endpoints_embed_stream_key() {
        let config = ClientConfig {
            ws_base: "wss://monitor.example.com/".into(),
            api_base: "https://monitor.example.com/v2".into(),
            ..Default::default()
        };
        let key = StreamKey::new("cam-3").unwrap();
        assert_eq!(
            config.stream_endpoint(&key).unwrap().as_str(),
            "wss://monitor.example.com/ws/video/cam-3"
        );
        assert_eq!(
            config.settings_endpoint(&key).unwrap().as_str(),
            "https://monitor.example.com/v2/api/video-streams/cam-3/config"
        );
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ClientConfig::from_file("/nonexistent/camfeed.yaml").unwrap_err();
        assert!(matches!(err, StreamError::File { .. }));
    }
}
