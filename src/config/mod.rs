use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub ytdlp: ToolConfig,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config")
    }

    pub fn get_logging_format(&self) -> &str {
        &self.logging.format
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// "json" or "plain"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
        }
    }
}

/// How to launch yt-dlp and where its downloads land.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ToolConfig {
    pub binary: String,
    /// Arguments placed before every generated argument list,
    /// e.g. `["-m", "yt_dlp"]` when `binary` is a Python interpreter.
    pub base_args: Vec<String>,
    pub download_dir: PathBuf,
    pub merge_output_format: String,
    pub metadata_timeout_secs: u64,
    pub download_timeout_secs: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            base_args: Vec::new(),
            download_dir: PathBuf::from("downloads"),
            merge_output_format: String::new(),
            metadata_timeout_secs: 30,
            download_timeout_secs: 0,
        }
    }
}

impl ToolConfig {
    pub fn metadata_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.metadata_timeout_secs)
    }

    pub fn download_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.download_timeout_secs)
    }

    pub fn merge_output_format(&self) -> Option<&str> {
        let format = self.merge_output_format.trim();
        (!format.is_empty()).then_some(format)
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.get_logging_format(), "json");
        assert_eq!(config.ytdlp.binary, "yt-dlp");
        assert!(config.ytdlp.base_args.is_empty());
        assert_eq!(config.ytdlp.download_dir, PathBuf::from("downloads"));
        assert_eq!(config.ytdlp.metadata_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.ytdlp.download_timeout(), None);
        assert_eq!(config.ytdlp.merge_output_format(), None);
    }

    #[test]
    fn test_partial_config() {
        let config = Config::from_toml(
            r#"
            [logging]
            format = "plain"

            [ytdlp]
            binary = "python3"
            base_args = ["-m", "yt_dlp"]
            merge_output_format = "mp4"
            metadata_timeout_secs = 0
            download_timeout_secs = 600
            "#,
        )
        .unwrap();

        assert_eq!(config.get_logging_format(), "plain");
        assert_eq!(config.ytdlp.binary, "python3");
        assert_eq!(config.ytdlp.base_args, vec!["-m", "yt_dlp"]);
        assert_eq!(config.ytdlp.download_dir, PathBuf::from("downloads"));
        assert_eq!(config.ytdlp.merge_output_format(), Some("mp4"));
        assert_eq!(config.ytdlp.metadata_timeout(), None);
        assert_eq!(
            config.ytdlp.download_timeout(),
            Some(Duration::from_secs(600))
        );
    }

    #[test]
    fn test_invalid_config() {
        assert!(Config::from_toml("[ytdlp]\nbinary = 5").is_err());
    }

    #[test]
    fn test_missing_config_file() {
        assert!(Config::from_file("/nonexistent/vidgrab/config.toml").is_err());
    }
}
