//! core::config
//!
//! Repository-local configuration.
//!
//! Located at `<common_dir>/tether/config.toml`. Every field has a default,
//! so an absent file is equivalent to an empty one. The config fixes the
//! policy knobs the synchronization algorithms leave open: the branch-name
//! prefix and slug bound used when deriving local branch names, and the
//! prefix used when naming remotes added for fork-sourced pull requests.
//!
//! # Example
//!
//! ```toml
//! [branch]
//! prefix = "pr/"
//! max_slug_length = 40
//!
//! [remote]
//! fork_prefix = "fork-"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::paths::SyncPaths;

/// Errors from configuration loading and saving.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config at {path}: {message}")]
    ReadError {
        /// Path that failed
        path: String,
        /// Underlying error
        message: String,
    },

    /// Failed to parse the config file.
    #[error("failed to parse config at {path}: {message}")]
    ParseError {
        /// Path that failed
        path: String,
        /// Underlying error
        message: String,
    },

    /// Failed to write the config file.
    #[error("failed to write config at {path}: {message}")]
    WriteError {
        /// Path that failed
        path: String,
        /// Underlying error
        message: String,
    },
}

/// Branch-naming settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BranchConfig {
    /// Prefix for derived local branch names (default: "pr/").
    pub prefix: String,

    /// Maximum slug length derived from the pull request title.
    pub max_slug_length: usize,
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            prefix: "pr/".to_string(),
            max_slug_length: 40,
        }
    }
}

/// Remote-naming settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    /// Prefix for remotes added to reach fork-sourced pull requests.
    /// The fork owner's login is appended (e.g. `fork-octocat`).
    pub fork_prefix: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            fork_prefix: "fork-".to_string(),
        }
    }
}

/// Repository configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Branch-naming settings.
    pub branch: BranchConfig,

    /// Remote-naming settings.
    pub remote: RemoteConfig,
}

impl RepoConfig {
    /// Load the repository configuration, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ReadError`] if the file exists but cannot be read
    /// - [`ConfigError::ParseError`] if the file is not valid TOML
    pub fn load(paths: &SyncPaths) -> Result<Self, ConfigError> {
        let path = paths.config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save the configuration, creating the tether directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WriteError`] if the directory or file cannot
    /// be written.
    pub fn save(&self, paths: &SyncPaths) -> Result<(), ConfigError> {
        let path = paths.config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: parent.display().to_string(),
                message: e.to_string(),
            })?;
        }
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::WriteError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        fs::write(&path, contents).map_err(|e| ConfigError::WriteError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}
