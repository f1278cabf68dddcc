//! Configuration file handling for the treesync CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use treesync_client::{ClientConfig, StreamConfig};

use crate::output::OutputFormat;

/// Configuration for the CLI tool
///
/// ```toml
/// auth = "secret"
/// output = "json"
///
/// [stream]
/// stale_timeout_ms = 45000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default credential
    pub auth: Option<String>,
    /// Default output format
    pub output: Option<OutputFormat>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// Stream timings
    pub stream: Option<StreamConfig>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("treesync");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(
        &self,
        auth: Option<&str>,
        output: Option<OutputFormat>,
        no_color: bool,
    ) -> MergedConfig {
        MergedConfig {
            client: ClientConfig {
                auth: auth.map(String::from).or_else(|| self.auth.clone()),
                stream: self.stream.clone().unwrap_or_default(),
            },
            output: output.or(self.output).unwrap_or_default(),
            no_color: no_color || self.no_color.unwrap_or(false),
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub client: ClientConfig,
    pub output: OutputFormat,
    pub no_color: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_config_file() {
        let config: Config = toml::from_str(
            r#"
auth = "from-file"
output = "json"

[stream]
error_delay_ms = 1000
"#,
        )
        .unwrap();

        assert_eq!(config.auth.as_deref(), Some("from-file"));
        assert_eq!(config.output, Some(OutputFormat::Json));
        let stream = config.stream.unwrap();
        assert_eq!(stream.error_delay_ms, 1000);
        assert_eq!(stream.stale_timeout_ms, 45_000);
    }

    #[test]
    fn test_args_override_file() {
        let config = Config {
            auth: Some("from-file".into()),
            output: Some(OutputFormat::Json),
            no_color: None,
            stream: None,
        };

        let merged = config.merge_with_args(Some("from-args"), Some(OutputFormat::Csv), false);
        assert_eq!(merged.client.auth.as_deref(), Some("from-args"));
        assert_eq!(merged.output, OutputFormat::Csv);
        assert!(!merged.no_color);

        let merged = config.merge_with_args(None, None, true);
        assert_eq!(merged.client.auth.as_deref(), Some("from-file"));
        assert_eq!(merged.output, OutputFormat::Json);
        assert!(merged.no_color);
        assert_eq!(merged.client.stream, StreamConfig::default());
    }
}
