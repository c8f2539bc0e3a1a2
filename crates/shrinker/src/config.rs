use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::{Result, ShrinkError};
use crate::quality::Quality;

/// Configuration for clip scanning and shrinking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShrinkConfig {
    /// Explicit ffmpeg binary; environment overrides still take precedence
    pub ffmpeg_bin: Option<PathBuf>,
    /// Directory shipped alongside the tool that may contain an ffmpeg binary
    pub resource_dir: Option<PathBuf>,
    /// JSON file remembering the last used source and output directories
    pub preferences_path: PathBuf,
    /// Quality tier used when none is given on the command line
    pub quality: Quality,
    /// Let ffmpeg replace existing outputs (`-y`) instead of skipping them (`-n`)
    pub overwrite: bool,
    /// Remove each original after it has been transcoded successfully
    pub delete_originals: bool,
}

impl Default for ShrinkConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl ShrinkConfig {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        Self {
            ffmpeg_bin: None,
            resource_dir: None,
            preferences_path: default_preferences_path(),
            quality: Quality::Hd,
            overwrite: false,
            delete_originals: false,
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .map_err(|e| ShrinkError::io(config_path, e))?;

                // TOML by extension, JSON otherwise
                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content).map_err(|e| {
                        ShrinkError::Config(format!("{}: {}", config_path.display(), e))
                    })?;
                } else {
                    config = serde_json::from_str(&content).map_err(|e| {
                        ShrinkError::Config(format!("{}: {}", config_path.display(), e))
                    })?;
                }
            }
        }

        Ok(config)
    }
}

fn default_preferences_path() -> PathBuf {
    let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"));
    match home {
        Some(home) => PathBuf::from(home)
            .join(".config")
            .join("shrinkcam")
            .join("preferences.json"),
        None => PathBuf::from("shrinkcam-preferences.json"),
    }
}
