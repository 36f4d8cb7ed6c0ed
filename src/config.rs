// SPDX-License-Identifier: MPL-2.0

//! Configuration
//!
//! Stored as JSON in the platform config directory. A missing or broken file
//! never stops the meter; it falls back to defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monitor::history::DEFAULT_HISTORY_POINTS;

const CONFIG_FILE: &str = "config.json";
const STORE_FILE: &str = "usage.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How often the counters are sampled
    pub update_interval_ms: u64,
    /// How often the presentation layer redraws
    pub refresh_interval_ms: u64,
    /// Length of the speed history
    pub history_points: usize,
    /// Overrides the platform data directory
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            update_interval_ms: 1000,
            refresh_interval_ms: 2000,
            history_points: DEFAULT_HISTORY_POINTS,
            data_dir: None,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io.github", "speedmeter", "speedmeter")
}

impl Config {
    /// Parse `path`, clamping out-of-range values.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_slice(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.normalized())
    }

    /// Like [`Config::read`] but never fails.
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(config) => config,
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                log::warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Load from the platform config directory.
    pub fn load_default() -> Self {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Self::default(),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Where the usage store lives.
    pub fn store_path(&self) -> Option<PathBuf> {
        self.data_dir
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().to_path_buf()))
            .map(|dir| dir.join(STORE_FILE))
    }

    pub fn normalized(mut self) -> Self {
        self.update_interval_ms = self.update_interval_ms.clamp(500, 5000);
        self.refresh_interval_ms = self.refresh_interval_ms.clamp(500, 10_000);
        self.history_points = self.history_points.clamp(1, 3600);
        self
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}
