//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the backend URL, the idle timeout, and the last username used to log in.
//!
//! Configuration is stored at `~/.config/kerjaya/config.json`; the
//! `KERJAYA_API_URL` and `KERJAYA_IDLE_TIMEOUT_MS` environment variables
//! override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::DEFAULT_API_BASE_URL;
use crate::auth::DEFAULT_IDLE_TIMEOUT;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "kerjaya";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Subdirectory of the cache dir holding the persisted session keys
const SESSION_DIR: &str = "session";

const ENV_API_URL: &str = "KERJAYA_API_URL";
const ENV_IDLE_TIMEOUT_MS: &str = "KERJAYA_IDLE_TIMEOUT_MS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub idle_timeout_ms: u64,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT.as_millis() as u64,
            last_username: None,
        }
    }
}

impl Config {
    /// Load from disk, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(raw) = lookup(ENV_IDLE_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.idle_timeout_ms = ms,
                Err(_) => warn!(value = %raw, "Ignoring invalid {}", ENV_IDLE_TIMEOUT_MS),
            }
        }
    }

    /// The configured idle timeout; zero falls back to the default.
    pub fn idle_timeout(&self) -> Duration {
        if self.idle_timeout_ms == 0 {
            warn!("Idle timeout of 0 ms is not allowed, using default");
            return DEFAULT_IDLE_TIMEOUT;
        }
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Directory backing `FileStorage` for the session keys.
    pub fn session_dir(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join(SESSION_DIR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://127.0.0.1:5000");
        assert_eq!(config.idle_timeout(), Duration::from_millis(600_000));
        assert!(config.last_username.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"last_username":"ada"}"#).unwrap();
        assert_eq!(config.last_username.as_deref(), Some("ada"));
        assert_eq!(config.idle_timeout_ms, 600_000);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("KERJAYA_API_URL", "https://api.kerjaya.example"),
            ("KERJAYA_IDLE_TIMEOUT_MS", "5000"),
        ]));
        assert_eq!(config.api_base_url, "https://api.kerjaya.example");
        assert_eq!(config.idle_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_overrides_are_ignored() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("KERJAYA_API_URL", "  "),
            ("KERJAYA_IDLE_TIMEOUT_MS", "ten minutes"),
        ]));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.idle_timeout_ms, 600_000);
    }

    #[test]
    fn test_zero_timeout_falls_back() {
        let config = Config {
            idle_timeout_ms: 0,
            ..Config::default()
        };
        assert_eq!(config.idle_timeout(), DEFAULT_IDLE_TIMEOUT);
    }

    #[test]
    fn test_save_to_writes_loadable_json() {
        let dir = std::env::temp_dir().join(format!("kerjaya-config-{}", std::process::id()));
        let path = dir.join("nested").join(CONFIG_FILE);
        let config = Config {
            last_username: Some("ada".to_string()),
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let reloaded: Config = serde_json::from_str(&contents).unwrap();
        assert_eq!(reloaded.last_username.as_deref(), Some("ada"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
