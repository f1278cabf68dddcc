//! Client configuration with YAML support

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Client configuration
///
/// Can be loaded from YAML or JSON, or constructed programmatically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Credential sent with every stream request (optional)
    #[serde(default)]
    pub auth: Option<String>,

    /// Stream and liveness timings
    #[serde(default)]
    pub stream: StreamConfig,
}

/// Stream timing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Watchdog window, re-armed on every frame (default: 45s)
    #[serde(default = "default_stale_timeout")]
    pub stale_timeout_ms: u64,

    /// Silence that counts as a dead connection when the window expires
    /// (default: 35s)
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_ms: u64,

    /// Pause before re-opening after repeated failures (default: 5s)
    #[serde(default = "default_error_delay")]
    pub error_delay_ms: u64,

    /// Connect timeout for opening a stream (default: 10s)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            stale_timeout_ms: default_stale_timeout(),
            idle_threshold_ms: default_idle_threshold(),
            error_delay_ms: default_error_delay(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

fn default_stale_timeout() -> u64 {
    45_000 // 45 seconds
}

fn default_idle_threshold() -> u64 {
    35_000 // 35 seconds
}

fn default_error_delay() -> u64 {
    5_000 // 5 seconds
}

fn default_connect_timeout() -> u64 {
    10_000 // 10 seconds
}

impl StreamConfig {
    /// Watchdog window
    pub fn stale_timeout(&self) -> Duration {
        Duration::from_millis(self.stale_timeout_ms)
    }

    /// Idle threshold checked when the window expires
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_millis(self.idle_threshold_ms)
    }

    /// Delay before a paced re-open
    pub fn error_delay(&self) -> Duration {
        Duration::from_millis(self.error_delay_ms)
    }

    /// Connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl ClientConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize configuration to YAML
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Create a builder for programmatic configuration
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the credential
    pub fn auth(mut self, auth: impl Into<String>) -> Self {
        self.config.auth = Some(auth.into());
        self
    }

    /// Set the watchdog window in milliseconds
    pub fn stale_timeout_ms(mut self, ms: u64) -> Self {
        self.config.stream.stale_timeout_ms = ms;
        self
    }

    /// Set the idle threshold in milliseconds
    pub fn idle_threshold_ms(mut self, ms: u64) -> Self {
        self.config.stream.idle_threshold_ms = ms;
        self
    }

    /// Set the paced re-open delay in milliseconds
    pub fn error_delay_ms(mut self, ms: u64) -> Self {
        self.config.stream.error_delay_ms = ms;
        self
    }

    /// Set the connect timeout in milliseconds
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.stream.connect_timeout_ms = ms;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.stale_timeout(), Duration::from_secs(45));
        assert_eq!(config.idle_threshold(), Duration::from_secs(35));
        assert_eq!(config.error_delay(), Duration::from_secs(5));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
auth: secret-token
stream:
  stale_timeout_ms: 20000
"#;
        let config = ClientConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.auth.as_deref(), Some("secret-token"));
        assert_eq!(config.stream.stale_timeout_ms, 20_000);
        // Unset fields keep their defaults
        assert_eq!(config.stream.idle_threshold_ms, 35_000);
    }

    #[test]
    fn test_parse_empty_json() {
        let config = ClientConfig::from_json("{}").unwrap();
        assert!(config.auth.is_none());
        assert_eq!(config.stream, StreamConfig::default());
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::builder()
            .auth("token")
            .stale_timeout_ms(1_000)
            .idle_threshold_ms(800)
            .error_delay_ms(50)
            .build();
        assert_eq!(config.auth.as_deref(), Some("token"));
        assert_eq!(config.stream.stale_timeout(), Duration::from_secs(1));
        assert_eq!(config.stream.error_delay(), Duration::from_millis(50));
    }

    #[test]
    fn test_yaml_roundtrip_keeps_timings() {
        let config = ClientConfig::builder().error_delay_ms(250).build();
        let yaml = config.to_yaml().unwrap();
        let parsed = ClientConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.stream.error_delay_ms, 250);
    }
}
