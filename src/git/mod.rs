//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **only doorway** to Git. All repository reads and
//! writes flow through this interface; no other module imports `git2` and
//! no code parses `.git` internals directly. We use the `git2` crate
//! exclusively (no shelling out to the git CLI).
//!
//! # Responsibilities
//!
//! - Repository discovery and opening
//! - Working-tree status and in-progress-operation detection
//! - Ref operations (read, CAS update, delete)
//! - Branch operations (list, create, fast-forward, checkout)
//! - Ancestry queries (merge-base, ahead/behind, is-ancestor)
//! - Object operations (blob at path, read/write blob)
//! - Remote operations (list, add, single-ref fetch, URL parsing)

mod interface;

pub use interface::{
    Git, GitError, GitState, LocalBranch, RefEntry, RemoteInfo, RepoInfo, Upstream, WorktreeStatus,
};
