use crate::sync::MAX_REFRESH_INTERVAL;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const API_KEY_ENV: &str = "FASTFOREX_API_KEY";
const DEFAULT_BASE_URL: &str = "https://api.fastforex.io";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: None,
        }
    }
}

impl ProviderConfig {
    /// Configured key, else the environment, else empty.
    pub fn api_key(&self) -> String {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .unwrap_or_default()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn default_base_currency() -> String {
    "MYR".to_string()
}

fn default_refresh_interval_minutes() -> u64 {
    60
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default = "default_refresh_interval_minutes")]
    pub refresh_interval_minutes: u64,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            provider: ProviderConfig::default(),
            base_currency: default_base_currency(),
            refresh_interval_minutes: default_refresh_interval_minutes(),
            data_path: None,
        }
    }
}

impl AppConfig {
    /// Loads the default config file, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "fxsync", "fxsync")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "fxsync", "fxsync")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().join("store"))
    }

    /// Configured cadence, clamped to between one minute and the scheduler's
    /// maximum.
    pub fn refresh_interval(&self) -> Duration {
        let secs = self.refresh_interval_minutes.max(1).saturating_mul(60);
        Duration::from_secs(secs).min(MAX_REFRESH_INTERVAL)
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
provider:
  base_url: "http://example.com/fx"
  api_key: "secret"
  timeout_secs: 5
base_currency: "EUR"
refresh_interval_minutes: 15
data_path: "/tmp/fxsync"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.provider.base_url, "http://example.com/fx");
        assert_eq!(config.provider.api_key(), "secret");
        assert_eq!(config.provider.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.base_currency, "EUR");
        assert_eq!(config.refresh_interval(), Duration::from_secs(15 * 60));
        assert_eq!(config.data_path().unwrap(), PathBuf::from("/tmp/fxsync"));
    }

    #[test]
    fn test_config_defaults() {
        let config: AppConfig = serde_yaml::from_str("data_path: /tmp/x\n").unwrap();
        assert_eq!(config.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.base_currency, "MYR");
        assert_eq!(config.refresh_interval(), Duration::from_secs(60 * 60));
        assert!(config.provider.timeout().is_none());
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config: AppConfig = serde_yaml::from_str("refresh_interval_minutes: 0\n").unwrap();
        assert_eq!(config.refresh_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_huge_interval_is_clamped() {
        let config: AppConfig =
            serde_yaml::from_str(&format!("refresh_interval_minutes: {}\n", u64::MAX)).unwrap();
        assert_eq!(config.refresh_interval(), MAX_REFRESH_INTERVAL);
        assert!(crate::sync::RefreshScheduler::with_interval(config.refresh_interval()).is_ok());
    }

    #[test]
    fn test_load_from_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::load_from_path(dir.path().join("missing.yaml"));
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }
}
