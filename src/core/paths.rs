//! core::paths
//!
//! Centralized path routing for tether's repository-local storage.
//!
//! All crate state lives under `<common_dir>/tether/`:
//! - `config.toml` - repository configuration
//! - `lock` - exclusive lock file for mutating operations
//!
//! Repo-scoped storage always uses `common_dir`, which is shared across
//! linked worktrees; no code outside this module computes these paths.
//!
//! # Example
//!
//! ```
//! use tether::core::paths::SyncPaths;
//! use std::path::PathBuf;
//!
//! let paths = SyncPaths::new(
//!     PathBuf::from("/repo/.git"),
//!     PathBuf::from("/repo/.git"),
//! );
//! assert_eq!(
//!     paths.config_path(),
//!     PathBuf::from("/repo/.git/tether/config.toml")
//! );
//! ```

use std::path::PathBuf;

use crate::git::RepoInfo;

/// Path routing for tether storage inside a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPaths {
    /// Path to the per-worktree .git directory.
    /// For normal repos this equals `common_dir`; for linked worktrees it
    /// is `.git/worktrees/<name>/`.
    pub git_dir: PathBuf,

    /// Path to the shared git directory (refs, objects, config).
    pub common_dir: PathBuf,
}

impl SyncPaths {
    /// Create paths from git_dir and common_dir.
    pub fn new(git_dir: PathBuf, common_dir: PathBuf) -> Self {
        Self {
            git_dir,
            common_dir,
        }
    }

    /// Create paths from a scanned [`RepoInfo`].
    pub fn from_repo_info(info: &RepoInfo) -> Self {
        Self {
            git_dir: info.git_dir.clone(),
            common_dir: info.common_dir.clone(),
        }
    }

    /// Directory holding all tether state (`<common_dir>/tether/`).
    pub fn tether_dir(&self) -> PathBuf {
        self.common_dir.join("tether")
    }

    /// Repository configuration file.
    pub fn config_path(&self) -> PathBuf {
        self.tether_dir().join("config.toml")
    }

    /// Exclusive lock file for mutating operations.
    pub fn lock_path(&self) -> PathBuf {
        self.tether_dir().join("lock")
    }
}
