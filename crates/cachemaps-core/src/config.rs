//! Application configuration management.
//!
//! This module handles loading and saving the configuration: where tiles
//! and offline maps live, which static map service to call and how the
//! background queue is sized.
//!
//! Configuration is stored at `~/.config/cachemaps/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::{DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_STATIC_MAP_URL};
use crate::downloader::{DEFAULT_MARKER_BASE_URL, DEFAULT_SUBMIT_TIMEOUT};
use crate::fetch::DEFAULT_QUEUE_CAPACITY;

/// Application name used for config/data directory paths
const APP_NAME: &str = "cachemaps";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `api_key`
pub const API_KEY_ENV: &str = "CACHEMAPS_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the per-geocache tile folders
    pub data_dir: Option<PathBuf>,
    /// Folder scanned for `.map` files
    pub offline_maps_dir: Option<PathBuf>,
    pub static_map_url: String,
    pub marker_icon_base_url: String,
    pub api_key: Option<String>,
    pub queue_capacity: usize,
    pub submit_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            offline_maps_dir: None,
            static_map_url: DEFAULT_STATIC_MAP_URL.to_string(),
            marker_icon_base_url: DEFAULT_MARKER_BASE_URL.to_string(),
            api_key: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            submit_timeout_secs: DEFAULT_SUBMIT_TIMEOUT.as_secs(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Load from an explicit path, falling back to defaults when it is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Replace `api_key` when the environment provides one.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.api_key = Some(key.trim().to_string());
            }
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match self.data_dir {
            Some(ref dir) => Ok(dir.clone()),
            None => Ok(Self::app_data_dir()?.join("geocaches")),
        }
    }

    pub fn offline_maps_dir(&self) -> Result<PathBuf> {
        match self.offline_maps_dir {
            Some(ref dir) => Ok(dir.clone()),
            None => Ok(Self::app_data_dir()?.join("maps")),
        }
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn app_data_dir() -> Result<PathBuf> {
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("config.json")).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.queue_capacity, 50);
        assert_eq!(config.submit_timeout(), Duration::from_secs(20));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.static_map_url, DEFAULT_STATIC_MAP_URL);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");
        let config = Config {
            data_dir: Some(temp_dir.path().join("tiles")),
            api_key: Some("abc123".to_string()),
            queue_capacity: 8,
            ..Default::default()
        };

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded, config);
        assert_eq!(loaded.data_dir().unwrap(), temp_dir.path().join("tiles"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{"offline_maps_dir": "/srv/maps"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.offline_maps_dir().unwrap(), PathBuf::from("/srv/maps"));
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
