use crate::model::election::PageSize;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Engine settings. Every field has a default, so a config file only needs
/// the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub api_base_url: String,
    /// First value shown by the reveal countdown.
    pub countdown_from: u32,
    pub tick_interval_ms: u64,
    /// Shown in place of a name whose lookup failed.
    pub fallback_name: String,
    pub name_cache_capacity: usize,
    pub request_timeout_secs: u64,
    pub default_page_size: PageSize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api".to_string(),
            countdown_from: 3,
            tick_interval_ms: 1000,
            fallback_name: "Unknown".to_string(),
            name_cache_capacity: 512,
            request_timeout_secs: 15,
            default_page_size: PageSize::Six,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"countdownFrom": 5, "defaultPageSize": 24}"#).unwrap();
        assert_eq!(config.countdown_from, 5);
        assert_eq!(config.default_page_size, PageSize::TwentyFour);
        assert_eq!(config.fallback_name, "Unknown");
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = EngineConfig::load(Path::new("/nonexistent/reveal.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/reveal.json"));
    }
}
