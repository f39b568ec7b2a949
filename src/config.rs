//! Soundboard configuration: JSON file with defaults for every missing field.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::audio_engine::constants::{CHUNK_INTERVAL_MS, LOOP_GAP_MS};
use crate::capture::encoder::PREFERRED_MIME_TYPES;

/// Environment variable overriding `data_dir`.
pub const DATA_DIR_ENV: &str = "SOUNDBOARD_DATA_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SoundboardConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_key_namespace")]
    pub key_namespace: String,
    #[serde(default = "default_storage_quota_bytes")]
    pub storage_quota_bytes: u64,
    #[serde(default = "default_chunk_interval_ms")]
    pub chunk_interval_ms: u64,
    #[serde(default = "default_loop_gap_ms")]
    pub loop_gap_ms: u64,
    #[serde(default = "default_mime_preferences")]
    pub mime_preferences: Vec<String>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("soundboard-data")
}
fn default_key_namespace() -> String {
    "soundboard".to_string()
}
fn default_storage_quota_bytes() -> u64 {
    512 * 1024 * 1024
}
fn default_chunk_interval_ms() -> u64 {
    CHUNK_INTERVAL_MS
}
fn default_loop_gap_ms() -> u64 {
    LOOP_GAP_MS
}
fn default_mime_preferences() -> Vec<String> {
    PREFERRED_MIME_TYPES.iter().map(|s| s.to_string()).collect()
}

impl Default for SoundboardConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            key_namespace: default_key_namespace(),
            storage_quota_bytes: default_storage_quota_bytes(),
            chunk_interval_ms: default_chunk_interval_ms(),
            loop_gap_ms: default_loop_gap_ms(),
            mime_preferences: default_mime_preferences(),
        }
    }
}

impl SoundboardConfig {
    /// Reads `path` when given, otherwise starts from defaults; then applies the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(std::env::var_os(DATA_DIR_ENV).map(PathBuf::from));
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env(&mut self, data_dir: Option<PathBuf>) {
        if let Some(dir) = data_dir.filter(|dir| !dir.as_os_str().is_empty()) {
            log::debug!("{DATA_DIR_ENV} overrides data dir with {}", dir.display());
            self.data_dir = dir;
        }
    }

    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms.max(1))
    }

    pub fn loop_gap(&self) -> Duration {
        Duration::from_millis(self.loop_gap_ms)
    }
}
