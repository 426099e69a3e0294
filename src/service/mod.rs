//! service
//!
//! The pull request synchronization service: the coordination logic
//! between the local Git repository and the remote pull-request accessor.
//!
//! # Modules
//!
//! - [`sync`] - The [`PullRequestService`] orchestrator
//! - [`association`] - Branch-to-pull-request association storage
//! - [`divergence`] - Ahead/behind computation against a PR's base
//! - `extract` - File extraction for diff display
//!
//! # Error Handling
//!
//! Every operation surfaces failures as a [`SyncError`] variant with an
//! actionable message; nothing is swallowed and nothing retries
//! automatically. Partial failures keep their stage visible: a
//! [`SyncError::Checkout`] after a successful fetch tells the caller the
//! branch ref exists and only the checkout needs to be retried.

pub mod association;
pub mod divergence;
mod extract;
pub mod sync;

use thiserror::Error;

pub use association::{AssociationEntry, AssociationStore, PrAssociation, StoreError};
pub use divergence::HistoryDivergence;
pub use sync::PullRequestService;

use crate::core::config::ConfigError;
use crate::core::ops::LockError;
use crate::core::types::TypeError;
use crate::git::GitError;
use crate::host::HostError;

/// Errors from synchronization operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The repository path is invalid or unreadable.
    #[error("cannot access repository: {0}")]
    RepositoryAccess(String),

    /// A checkout was blocked by working tree state.
    #[error("working tree has uncommitted changes: {0}")]
    DirtyWorkingTree(String),

    /// The hosting service could not be reached or rejected the request.
    #[error("could not reach the hosting service: {0}")]
    RemoteAccess(HostError),

    /// The pull request does not exist on the hosting service.
    #[error("pull request #{0} not found")]
    PullRequestNotFound(u64),

    /// A required ref could not be resolved locally.
    #[error("ref not available locally: {0}")]
    RefNotFound(String),

    /// A commit could not be resolved locally (fetch first).
    #[error("revision not found locally: {0}")]
    RevisionNotFound(String),

    /// The file does not exist in the tree of the given revision.
    #[error("file {path} does not exist at revision {revision}")]
    FileNotFoundAtRevision {
        /// The file path that was looked up
        path: String,
        /// The revision whose tree was searched
        revision: String,
    },

    /// Local and remote histories have diverged; a fast-forward is not
    /// possible and this service never merges.
    #[error("branch {0} has diverged from its upstream; merge or rebase manually")]
    NonFastForward(String),

    /// The current branch tracks no upstream.
    #[error("current branch does not track an upstream")]
    NoUpstream,

    /// No local branch exists for the pull request; fetch-and-checkout is
    /// the fallback.
    #[error("no local branch exists for pull request #{0}")]
    NoLocalBranch(u64),

    /// The fetch stage failed; nothing was created locally.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The checkout stage failed after a successful fetch; the local
    /// branch ref exists and HEAD is unchanged, so the checkout can be
    /// retried without re-fetching.
    #[error("checkout failed after fetch: {0}")]
    Checkout(String),

    /// Another mutating operation holds the repository lock.
    #[error("another synchronization operation is in progress")]
    Locked,

    /// Association storage failed.
    #[error("association store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration loading failed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A provided name failed validation.
    #[error("invalid name: {0}")]
    InvalidName(#[from] TypeError),

    /// Filesystem I/O failed (e.g. while writing an extracted artifact).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Uncategorized git failure.
    #[error("git error: {0}")]
    Git(GitError),
}

impl From<GitError> for SyncError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::NotARepo { path } => {
                SyncError::RepositoryAccess(format!("not a git repository: {}", path.display()))
            }
            GitError::BareRepo => {
                SyncError::RepositoryAccess("bare repository not supported".to_string())
            }
            GitError::AccessError { message } => SyncError::RepositoryAccess(message),
            GitError::RefNotFound { refname } => SyncError::RefNotFound(refname),
            GitError::ObjectNotFound { oid } => SyncError::RevisionNotFound(oid),
            GitError::PathNotFoundAtCommit { path, oid } => SyncError::FileNotFoundAtRevision {
                path,
                revision: oid,
            },
            GitError::DirtyWorktree { details } => SyncError::DirtyWorkingTree(details),
            GitError::OperationInProgress { operation } => {
                SyncError::DirtyWorkingTree(format!("{operation} in progress"))
            }
            GitError::NonFastForward { branch } => SyncError::NonFastForward(branch),
            GitError::FetchFailed { remote, message } => {
                SyncError::Fetch(format!("from {remote}: {message}"))
            }
            other => SyncError::Git(other),
        }
    }
}

impl From<HostError> for SyncError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::PullRequestNotFound(number) => SyncError::PullRequestNotFound(number),
            other => SyncError::RemoteAccess(other),
        }
    }
}

impl From<LockError> for SyncError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::AlreadyLocked => SyncError::Locked,
            other => SyncError::RepositoryAccess(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn git_errors_map_to_distinct_variants() {
        let err: SyncError = GitError::NotARepo {
            path: PathBuf::from("/nowhere"),
        }
        .into();
        assert!(matches!(err, SyncError::RepositoryAccess(_)));

        let err: SyncError = GitError::ObjectNotFound {
            oid: "abc".to_string(),
        }
        .into();
        assert!(matches!(err, SyncError::RevisionNotFound(_)));

        let err: SyncError = GitError::PathNotFoundAtCommit {
            path: "a.rs".to_string(),
            oid: "abc".to_string(),
        }
        .into();
        assert!(matches!(err, SyncError::FileNotFoundAtRevision { .. }));

        let err: SyncError = GitError::NonFastForward {
            branch: "b".to_string(),
        }
        .into();
        assert!(matches!(err, SyncError::NonFastForward(_)));
    }

    #[test]
    fn host_not_found_maps_to_pull_request_not_found() {
        let err: SyncError = HostError::PullRequestNotFound(42).into();
        assert!(matches!(err, SyncError::PullRequestNotFound(42)));

        let err: SyncError = HostError::RateLimited.into();
        assert!(matches!(err, SyncError::RemoteAccess(_)));
    }

    #[test]
    fn lock_contention_maps_to_locked() {
        let err: SyncError = LockError::AlreadyLocked.into();
        assert!(matches!(err, SyncError::Locked));
    }

    #[test]
    fn messages_are_actionable() {
        let err = SyncError::DirtyWorkingTree("2 unstaged changes".to_string());
        assert!(err.to_string().contains("uncommitted changes"));

        let err = SyncError::NoUpstream;
        assert!(err.to_string().contains("upstream"));

        let err = SyncError::Checkout("conflict".to_string());
        assert!(err.to_string().contains("after fetch"));
    }
}
