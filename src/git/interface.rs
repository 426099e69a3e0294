//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module is the **single doorway** to all Git operations in the crate.
//! All repository reads and writes flow through this interface, which returns
//! structured results and normalizes git2 errors into typed failure
//! categories. No other module imports `git2`.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants so higher layers can react
//! distinctly: a missing ref ([`GitError::RefNotFound`]) is not the same
//! failure as a missing object ([`GitError::ObjectNotFound`]) or a missing
//! path inside a commit's tree ([`GitError::PathNotFoundAtCommit`]).

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::{BranchName, Oid, RefName, TypeError};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object (commit, blob) not found in the repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// A path does not exist in the tree of the given commit.
    #[error("path {path} not found at commit {oid}")]
    PathNotFoundAtCommit {
        /// The file path that was looked up
        path: String,
        /// The commit whose tree was searched
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// Blob content is not valid UTF-8.
    #[error("blob is not valid UTF-8: {oid}")]
    InvalidUtf8 {
        /// The OID of the blob
        oid: String,
    },

    /// Working tree has changes that block a checkout.
    #[error("working tree is dirty: {details}")]
    DirtyWorktree {
        /// Description of what's dirty
        details: String,
    },

    /// Git operation in progress (rebase, merge, etc.).
    #[error("{operation} in progress")]
    OperationInProgress {
        /// The type of operation in progress
        operation: GitState,
    },

    /// A branch update would discard commits.
    #[error("branch {branch} has diverged and cannot be fast-forwarded")]
    NonFastForward {
        /// The branch that could not be updated
        branch: String,
    },

    /// Compare-and-swap precondition failed: the ref changed since it was
    /// read.
    #[error("ref {refname} changed concurrently: expected {expected}, found {actual}")]
    CasFailed {
        /// The ref being updated
        refname: String,
        /// The expected old value
        expected: String,
        /// The actual current value
        actual: String,
    },

    /// A remote with this name already exists with a different URL.
    #[error("remote {name} already exists")]
    RemoteExists {
        /// The remote name
        name: String,
    },

    /// Fetching from a remote failed.
    #[error("fetch from {remote} failed: {message}")]
    FetchFailed {
        /// The remote that was fetched
        remote: String,
        /// The underlying error
        message: String,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") || context == "HEAD" || context.contains("ref") {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }

    fn internal(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidRefName(msg) => GitError::InvalidRefName { message: msg },
            TypeError::InvalidBranchName(msg) => GitError::InvalidRefName { message: msg },
        }
    }
}

/// Information about a Git repository.
#[derive(Debug, Clone)]
pub struct RepoInfo {
    /// Path to the per-worktree .git directory
    pub git_dir: PathBuf,
    /// Path to the shared git directory (equals git_dir for normal repos)
    pub common_dir: PathBuf,
    /// Path to the working directory
    pub work_dir: PathBuf,
}

/// State of in-progress Git operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitState {
    /// No operation in progress.
    Clean,
    /// Rebase in progress.
    Rebase,
    /// Merge in progress.
    Merge,
    /// Cherry-pick in progress.
    CherryPick,
    /// Revert in progress.
    Revert,
    /// Bisect in progress.
    Bisect,
    /// Apply mailbox in progress.
    ApplyMailbox,
}

impl GitState {
    /// Check if any operation is in progress.
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, GitState::Clean)
    }

    /// Get a human-readable description of the state.
    pub fn description(&self) -> &'static str {
        match self {
            GitState::Clean => "clean",
            GitState::Rebase => "rebase",
            GitState::Merge => "merge",
            GitState::CherryPick => "cherry-pick",
            GitState::Revert => "revert",
            GitState::Bisect => "bisect",
            GitState::ApplyMailbox => "apply-mailbox",
        }
    }
}

impl std::fmt::Display for GitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Summary of working tree status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeStatus {
    /// Number of staged changes
    pub staged: usize,
    /// Number of unstaged changes to tracked files
    pub unstaged: usize,
    /// Number of untracked files
    pub untracked: usize,
    /// Whether there are unresolved conflicts
    pub has_conflicts: bool,
}

impl WorktreeStatus {
    /// Check if the worktree allows a checkout: no staged or unstaged
    /// changes and no conflicts. Untracked files do not block by
    /// themselves; git's safe checkout refuses to overwrite them.
    pub fn is_clean_for_checkout(&self) -> bool {
        self.staged == 0 && self.unstaged == 0 && !self.has_conflicts
    }
}

/// A ref with its name and target OID.
#[derive(Debug, Clone)]
pub struct RefEntry {
    /// The full ref name
    pub name: RefName,
    /// The OID the ref points to
    pub oid: Oid,
}

/// The upstream a local branch tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    /// Remote name (e.g. "origin")
    pub remote: String,
    /// Branch name on the remote (e.g. "main")
    pub branch: String,
    /// Remote-tracking ref (e.g. "refs/remotes/origin/main")
    pub tracking_ref: RefName,
}

/// A local branch with its tip and optional upstream.
#[derive(Debug, Clone)]
pub struct LocalBranch {
    /// The branch name
    pub name: BranchName,
    /// The commit the branch points to
    pub tip: Oid,
    /// The upstream the branch tracks, if configured
    pub upstream: Option<Upstream>,
}

/// A configured remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteInfo {
    /// Remote name
    pub name: String,
    /// Remote URL, if set and valid UTF-8
    pub url: Option<String>,
}

/// The Git interface.
///
/// This is the single point of interaction with Git. Handles are cheap to
/// open and are not cached across service operations; every operation
/// re-resolves repository state to avoid staleness.
pub struct Git {
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open a repository at the given path.
    ///
    /// Uses `git2::Repository::discover`, so `path` can be any directory
    /// within the repository.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        Ok(Self { repo })
    }

    /// Get repository information (git_dir, common_dir, work_dir).
    pub fn info(&self) -> Result<RepoInfo, GitError> {
        let git_dir = self.repo.path().to_path_buf();
        let common_dir = self.repo.commondir().to_path_buf();
        let work_dir = self.repo.workdir().ok_or(GitError::BareRepo)?.to_path_buf();

        Ok(RepoInfo {
            git_dir,
            common_dir,
            work_dir,
        })
    }

    // =========================================================================
    // State and Status
    // =========================================================================

    /// Get the current Git state (rebase, merge, etc.).
    pub fn state(&self) -> GitState {
        match self.repo.state() {
            git2::RepositoryState::Clean => GitState::Clean,
            git2::RepositoryState::Rebase
            | git2::RepositoryState::RebaseInteractive
            | git2::RepositoryState::RebaseMerge => GitState::Rebase,
            git2::RepositoryState::Merge => GitState::Merge,
            git2::RepositoryState::CherryPick | git2::RepositoryState::CherryPickSequence => {
                GitState::CherryPick
            }
            git2::RepositoryState::Revert | git2::RepositoryState::RevertSequence => {
                GitState::Revert
            }
            git2::RepositoryState::Bisect => GitState::Bisect,
            git2::RepositoryState::ApplyMailbox | git2::RepositoryState::ApplyMailboxOrRebase => {
                GitState::ApplyMailbox
            }
        }
    }

    /// Get working tree status summary.
    pub fn worktree_status(&self, include_untracked: bool) -> Result<WorktreeStatus, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(include_untracked)
            .include_ignored(false);

        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .map_err(GitError::internal)?;

        let mut result = WorktreeStatus::default();
        for entry in statuses.iter() {
            let status = entry.status();

            if status.is_conflicted() {
                result.has_conflicts = true;
            }
            if status.is_index_new()
                || status.is_index_modified()
                || status.is_index_deleted()
                || status.is_index_renamed()
                || status.is_index_typechange()
            {
                result.staged += 1;
            }
            if status.is_wt_modified()
                || status.is_wt_deleted()
                || status.is_wt_renamed()
                || status.is_wt_typechange()
            {
                result.unstaged += 1;
            }
            if status.is_wt_new() {
                result.untracked += 1;
            }
        }

        Ok(result)
    }

    /// Check whether the repository allows a checkout: no staged or
    /// unstaged changes, no conflicts, and no in-progress merge/rebase/
    /// cherry-pick state. Read-only.
    pub fn is_clean_for_checkout(&self) -> Result<bool, GitError> {
        if self.state().is_in_progress() {
            return Ok(false);
        }
        let status = self.worktree_status(false)?;
        Ok(status.is_clean_for_checkout())
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// Resolve a ref to its commit OID, peeling through symbolic refs and
    /// tags.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if the ref doesn't exist
    pub fn resolve_ref(&self, refname: &str) -> Result<Oid, GitError> {
        let reference = self
            .repo
            .find_reference(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;

        let oid = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, refname))?
            .id();

        Oid::new(oid.to_string()).map_err(GitError::from)
    }

    /// Resolve a ref, returning `None` if it doesn't exist.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.resolve_ref(refname) {
            Ok(oid) => Ok(Some(oid)),
            Err(GitError::RefNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get the HEAD commit OID.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if HEAD is unborn (new repository)
    pub fn head_oid(&self) -> Result<Oid, GitError> {
        let head = self
            .repo
            .head()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;

        let oid = head
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?
            .id();

        Oid::new(oid.to_string()).map_err(GitError::from)
    }

    /// Get the current branch name, if on a branch.
    ///
    /// Returns `None` if HEAD is detached or unborn.
    pub fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(GitError::internal(e)),
        };

        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(Some(BranchName::new(name)?));
            }
        }

        Ok(None) // Detached HEAD
    }

    /// Check if a ref exists.
    pub fn ref_exists(&self, refname: &str) -> bool {
        self.repo.find_reference(refname).is_ok()
    }

    /// List all refs matching a prefix.
    pub fn list_refs_by_prefix(&self, prefix: &str) -> Result<Vec<RefEntry>, GitError> {
        let pattern = format!("{prefix}*");
        let refs = self
            .repo
            .references_glob(&pattern)
            .map_err(GitError::internal)?;

        let mut entries = Vec::new();
        for reference in refs {
            let reference = reference.map_err(GitError::internal)?;

            let name = match reference.name() {
                Some(n) => n,
                None => continue, // Skip refs with non-UTF8 names
            };
            let ref_name = match RefName::new(name) {
                Ok(r) => r,
                Err(_) => continue,
            };

            // Peel to commit where possible; blob-target refs (like
            // association refs) fall back to the direct target
            let oid = match reference.peel_to_commit() {
                Ok(commit) => commit.id(),
                Err(_) => match reference.target() {
                    Some(oid) => oid,
                    None => continue,
                },
            };
            let oid = match Oid::new(oid.to_string()) {
                Ok(o) => o,
                Err(_) => continue,
            };

            entries.push(RefEntry {
                name: ref_name,
                oid,
            });
        }

        Ok(entries)
    }

    // =========================================================================
    // CAS Ref Operations
    // =========================================================================

    /// Update a ref with compare-and-swap semantics.
    ///
    /// The update only succeeds if the ref's current value matches
    /// `expected_old`; pass `None` for the create case (ref must not exist).
    /// Used by the association store so concurrent writers cannot clobber
    /// each other.
    ///
    /// # Errors
    ///
    /// - [`GitError::CasFailed`] if the current value doesn't match
    pub fn update_ref_cas(
        &self,
        refname: &str,
        new_oid: &Oid,
        expected_old: Option<&Oid>,
        message: &str,
    ) -> Result<(), GitError> {
        let current = self.try_resolve_ref_raw(refname)?;

        let precondition_ok = match (expected_old, current.as_deref()) {
            (Some(expected), Some(actual)) => expected.as_str() == actual,
            (None, None) => true,
            _ => false,
        };
        if !precondition_ok {
            return Err(GitError::CasFailed {
                refname: refname.to_string(),
                expected: expected_old
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| "<none>".to_string()),
                actual: current.unwrap_or_else(|| "<none>".to_string()),
            });
        }

        let oid = git2::Oid::from_str(new_oid.as_str())
            .map_err(|e| GitError::from_git2(e, new_oid.as_str()))?;
        self.repo
            .reference(refname, oid, true, message)
            .map_err(|e| GitError::from_git2(e, refname))?;

        Ok(())
    }

    /// Delete a ref with compare-and-swap semantics.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if the ref doesn't exist
    /// - [`GitError::CasFailed`] if the current value doesn't match
    pub fn delete_ref_cas(&self, refname: &str, expected_old: &Oid) -> Result<(), GitError> {
        match self.try_resolve_ref_raw(refname)? {
            None => {
                return Err(GitError::RefNotFound {
                    refname: refname.to_string(),
                });
            }
            Some(actual) if actual != expected_old.as_str() => {
                return Err(GitError::CasFailed {
                    refname: refname.to_string(),
                    expected: expected_old.to_string(),
                    actual,
                });
            }
            Some(_) => {}
        }

        let mut reference = self
            .repo
            .find_reference(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;
        reference
            .delete()
            .map_err(|e| GitError::from_git2(e, refname))?;

        Ok(())
    }

    /// Resolve a ref to its direct target without peeling to a commit.
    ///
    /// Use this for refs that point at non-commit objects, like the
    /// association store's blob refs. Returns `Ok(None)` if the ref doesn't
    /// exist.
    pub fn try_resolve_ref_to_object(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        Ok(match self.try_resolve_ref_raw(refname)? {
            Some(raw) => Some(Oid::new(raw)?),
            None => None,
        })
    }

    /// Resolve a ref to its raw target OID string.
    fn try_resolve_ref_raw(&self, refname: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_reference(refname) {
            Ok(reference) => {
                let resolved = reference.resolve().unwrap_or(reference);
                let oid = resolved.target().ok_or_else(|| GitError::Internal {
                    message: format!("ref {refname} has no target"),
                })?;
                Ok(Some(oid.to_string()))
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, refname)),
        }
    }

    // =========================================================================
    // Branches
    // =========================================================================

    /// List all local branches with their tips and upstreams.
    pub fn list_branches(&self) -> Result<Vec<LocalBranch>, GitError> {
        let branches = self
            .repo
            .branches(Some(git2::BranchType::Local))
            .map_err(GitError::internal)?;

        let mut result = Vec::new();
        for branch in branches {
            let (branch, _) = branch.map_err(GitError::internal)?;
            let name = match branch.name().ok().flatten() {
                Some(n) => n,
                None => continue,
            };
            // Skip invalid branch names
            let name = match BranchName::new(name) {
                Ok(b) => b,
                Err(_) => continue,
            };
            let tip = match branch.get().peel_to_commit() {
                Ok(commit) => Oid::new(commit.id().to_string())?,
                Err(_) => continue,
            };
            let upstream = self.branch_upstream(&name)?;

            result.push(LocalBranch {
                name,
                tip,
                upstream,
            });
        }

        Ok(result)
    }

    /// Get the tip of a local branch, or `None` if it doesn't exist.
    pub fn branch_tip(&self, name: &BranchName) -> Result<Option<Oid>, GitError> {
        self.try_resolve_ref(RefName::for_branch(name).as_str())
    }

    /// Get the upstream a local branch tracks, if configured.
    pub fn branch_upstream(&self, name: &BranchName) -> Result<Option<Upstream>, GitError> {
        let refname = RefName::for_branch(name);

        let remote = match self.repo.branch_upstream_remote(refname.as_str()) {
            Ok(buf) => match buf.as_str() {
                Some(s) => s.to_string(),
                None => return Ok(None),
            },
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(GitError::internal(e)),
        };

        let tracking = match self.repo.branch_upstream_name(refname.as_str()) {
            Ok(buf) => match buf.as_str() {
                Some(s) => s.to_string(),
                None => return Ok(None),
            },
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(GitError::internal(e)),
        };

        let prefix = format!("refs/remotes/{remote}/");
        let branch = match tracking.strip_prefix(&prefix) {
            Some(b) => b.to_string(),
            None => return Ok(None),
        };

        Ok(Some(Upstream {
            remote,
            branch,
            tracking_ref: RefName::new(tracking)?,
        }))
    }

    /// Create the branch at `target`, or fast-forward it if it already
    /// exists.
    ///
    /// An existing branch is only moved when `target` is a descendant of
    /// its current tip; anything else would discard local commits.
    ///
    /// # Errors
    ///
    /// - [`GitError::NonFastForward`] if the branch has diverged
    pub fn create_or_fast_forward_branch(
        &self,
        name: &BranchName,
        target: &Oid,
    ) -> Result<(), GitError> {
        let target_oid = git2::Oid::from_str(target.as_str())
            .map_err(|e| GitError::from_git2(e, target.as_str()))?;
        let commit = self
            .repo
            .find_commit(target_oid)
            .map_err(|e| GitError::from_git2(e, target.as_str()))?;

        match self.branch_tip(name)? {
            None => {
                self.repo
                    .branch(name.as_str(), &commit, false)
                    .map_err(GitError::internal)?;
            }
            Some(current) if current == *target => {}
            Some(current) => {
                if !self.is_ancestor(&current, target)? {
                    return Err(GitError::NonFastForward {
                        branch: name.to_string(),
                    });
                }
                let refname = RefName::for_branch(name);
                self.repo
                    .reference(
                        refname.as_str(),
                        target_oid,
                        true,
                        &format!("tether: fast-forward {name}"),
                    )
                    .map_err(|e| GitError::from_git2(e, refname.as_str()))?;
            }
        }

        Ok(())
    }

    /// Check out a local branch: update the working tree (safe mode) and
    /// point HEAD at the branch.
    ///
    /// Safe mode refuses to overwrite local modifications or conflicting
    /// untracked files, so a failed checkout leaves the previous state
    /// fully intact.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if the branch doesn't exist
    /// - [`GitError::DirtyWorktree`] if the checkout would overwrite
    ///   local changes
    pub fn checkout_branch(&self, name: &BranchName) -> Result<(), GitError> {
        let refname = RefName::for_branch(name);
        let reference = self
            .repo
            .find_reference(refname.as_str())
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;
        let commit = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;

        let mut opts = git2::build::CheckoutBuilder::new();
        opts.safe();
        self.repo
            .checkout_tree(commit.as_object(), Some(&mut opts))
            .map_err(|e| Self::map_checkout_error(e))?;
        self.repo
            .set_head(refname.as_str())
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;

        Ok(())
    }

    /// Fast-forward the current branch to `target`, updating the working
    /// tree first so a failed checkout leaves the branch ref unmoved.
    ///
    /// # Errors
    ///
    /// - [`GitError::DirtyWorktree`] if the working tree blocks the update
    pub fn fast_forward_current_branch(&self, target: &Oid) -> Result<(), GitError> {
        let head = self
            .repo
            .head()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;
        if !head.is_branch() {
            return Err(GitError::RefNotFound {
                refname: "HEAD is not on a branch".to_string(),
            });
        }

        let target_oid = git2::Oid::from_str(target.as_str())
            .map_err(|e| GitError::from_git2(e, target.as_str()))?;
        let commit = self
            .repo
            .find_commit(target_oid)
            .map_err(|e| GitError::from_git2(e, target.as_str()))?;

        let mut opts = git2::build::CheckoutBuilder::new();
        opts.safe();
        self.repo
            .checkout_tree(commit.as_object(), Some(&mut opts))
            .map_err(|e| Self::map_checkout_error(e))?;

        let refname = head.name().ok_or_else(|| GitError::Internal {
            message: "HEAD has a non-UTF8 name".to_string(),
        })?;
        let mut reference = self
            .repo
            .find_reference(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;
        reference
            .set_target(target_oid, "tether: fast-forward pull")
            .map_err(|e| GitError::from_git2(e, refname))?;

        Ok(())
    }

    fn map_checkout_error(err: git2::Error) -> GitError {
        if err.code() == git2::ErrorCode::Conflict {
            GitError::DirtyWorktree {
                details: "checkout would overwrite local changes".to_string(),
            }
        } else {
            GitError::internal(err)
        }
    }

    // =========================================================================
    // Ancestry Queries
    // =========================================================================

    /// Find the merge base (most recent common ancestor) of two commits.
    ///
    /// Returns `None` if the histories are unrelated.
    pub fn merge_base(&self, a: &Oid, b: &Oid) -> Result<Option<Oid>, GitError> {
        let oid_a =
            git2::Oid::from_str(a.as_str()).map_err(|e| GitError::from_git2(e, a.as_str()))?;
        let oid_b =
            git2::Oid::from_str(b.as_str()).map_err(|e| GitError::from_git2(e, b.as_str()))?;

        match self.repo.merge_base(oid_a, oid_b) {
            Ok(oid) => Ok(Some(Oid::new(oid.to_string())?)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::internal(e)),
        }
    }

    /// Count commits unique to each side of two refs relative to their
    /// merge base: `(ahead, behind)` where `ahead` counts commits reachable
    /// from `local` but not `upstream` and `behind` the reverse.
    pub fn ahead_behind(&self, local: &Oid, upstream: &Oid) -> Result<(usize, usize), GitError> {
        let local_oid = git2::Oid::from_str(local.as_str())
            .map_err(|e| GitError::from_git2(e, local.as_str()))?;
        let upstream_oid = git2::Oid::from_str(upstream.as_str())
            .map_err(|e| GitError::from_git2(e, upstream.as_str()))?;

        self.repo
            .graph_ahead_behind(local_oid, upstream_oid)
            .map_err(GitError::internal)
    }

    /// Check if `ancestor` is an ancestor of `descendant`.
    ///
    /// A commit is considered its own ancestor.
    pub fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError> {
        if ancestor == descendant {
            return Ok(true);
        }

        let ancestor_oid = git2::Oid::from_str(ancestor.as_str())
            .map_err(|e| GitError::from_git2(e, ancestor.as_str()))?;
        let descendant_oid = git2::Oid::from_str(descendant.as_str())
            .map_err(|e| GitError::from_git2(e, descendant.as_str()))?;

        self.repo
            .graph_descendant_of(descendant_oid, ancestor_oid)
            .map_err(GitError::internal)
    }

    // =========================================================================
    // Object Operations
    // =========================================================================

    /// Check if a commit exists in the local object store.
    pub fn commit_exists(&self, oid: &Oid) -> bool {
        git2::Oid::from_str(oid.as_str())
            .map(|o| self.repo.find_commit(o).is_ok())
            .unwrap_or(false)
    }

    /// Read the blob for `path` in the tree of `commit`.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if the commit doesn't exist
    /// - [`GitError::PathNotFoundAtCommit`] if the path doesn't exist in
    ///   that commit's tree
    pub fn blob_at_path(&self, commit: &Oid, path: &str) -> Result<Vec<u8>, GitError> {
        let commit_oid = git2::Oid::from_str(commit.as_str())
            .map_err(|e| GitError::from_git2(e, commit.as_str()))?;
        let commit_obj = self
            .repo
            .find_commit(commit_oid)
            .map_err(|e| GitError::from_git2(e, commit.as_str()))?;
        let tree = commit_obj.tree().map_err(GitError::internal)?;

        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == git2::ErrorCode::NotFound => {
                return Err(GitError::PathNotFoundAtCommit {
                    path: path.to_string(),
                    oid: commit.to_string(),
                });
            }
            Err(e) => return Err(GitError::internal(e)),
        };

        let object = entry.to_object(&self.repo).map_err(GitError::internal)?;
        let blob = object
            .peel_to_blob()
            .map_err(|_| GitError::PathNotFoundAtCommit {
                path: path.to_string(),
                oid: commit.to_string(),
            })?;

        Ok(blob.content().to_vec())
    }

    /// Write content as a blob and return its OID.
    pub fn write_blob(&self, content: &[u8]) -> Result<Oid, GitError> {
        let oid = self.repo.blob(content).map_err(GitError::internal)?;
        Oid::new(oid.to_string()).map_err(GitError::from)
    }

    /// Read a blob by OID.
    pub fn read_blob(&self, oid: &Oid) -> Result<Vec<u8>, GitError> {
        let git_oid =
            git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        let blob = self
            .repo
            .find_blob(git_oid)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        Ok(blob.content().to_vec())
    }

    /// Read a blob as a UTF-8 string.
    ///
    /// # Errors
    ///
    /// - [`GitError::InvalidUtf8`] if the blob is not valid UTF-8
    pub fn read_blob_as_string(&self, oid: &Oid) -> Result<String, GitError> {
        let content = self.read_blob(oid)?;
        String::from_utf8(content).map_err(|_| GitError::InvalidUtf8 {
            oid: oid.to_string(),
        })
    }

    // =========================================================================
    // Remote Operations
    // =========================================================================

    /// List all configured remotes.
    pub fn remotes(&self) -> Result<Vec<RemoteInfo>, GitError> {
        let names = self.repo.remotes().map_err(GitError::internal)?;

        let mut result = Vec::new();
        for name in names.iter().flatten() {
            let url = self
                .repo
                .find_remote(name)
                .ok()
                .and_then(|r| r.url().map(String::from));
            result.push(RemoteInfo {
                name: name.to_string(),
                url,
            });
        }

        Ok(result)
    }

    /// Get the URL for a remote, or `None` if the remote doesn't exist.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::internal(e)),
        }
    }

    /// Find the name of a remote whose URL matches `url`, comparing with a
    /// normalized form (trailing `.git` and `/` are insignificant).
    pub fn find_remote_by_url(&self, url: &str) -> Result<Option<String>, GitError> {
        let wanted = normalize_url(url);
        for remote in self.remotes()? {
            if let Some(existing) = remote.url {
                if normalize_url(&existing) == wanted {
                    return Ok(Some(remote.name));
                }
            }
        }
        Ok(None)
    }

    /// Add a remote with the given name and URL.
    ///
    /// # Errors
    ///
    /// - [`GitError::RemoteExists`] if a remote with this name exists
    pub fn add_remote(&self, name: &str, url: &str) -> Result<(), GitError> {
        match self.repo.remote(name, url) {
            Ok(_) => Ok(()),
            Err(e) if e.code() == git2::ErrorCode::Exists => Err(GitError::RemoteExists {
                name: name.to_string(),
            }),
            Err(e) => Err(GitError::internal(e)),
        }
    }

    /// Fetch a single refspec from a remote.
    ///
    /// Only the named ref is transferred, not the whole remote. The ref
    /// update performed by the refspec is atomic at the storage layer, so a
    /// cancelled or failed fetch never leaves a partially written ref.
    ///
    /// # Errors
    ///
    /// - [`GitError::FetchFailed`] on any transport or refspec failure
    pub fn fetch_ref(&self, remote: &str, refspec: &str) -> Result<(), GitError> {
        let mut remote_handle = self
            .repo
            .find_remote(remote)
            .map_err(|e| GitError::from_git2(e, remote))?;

        let config = self.repo.config().ok();
        let mut callbacks = git2::RemoteCallbacks::new();
        callbacks.credentials(move |url, username_from_url, _allowed| {
            if let Some(ref config) = config {
                if let Ok(cred) = git2::Cred::credential_helper(config, url, username_from_url) {
                    return Ok(cred);
                }
            }
            git2::Cred::default()
        });

        let mut opts = git2::FetchOptions::new();
        opts.remote_callbacks(callbacks);

        remote_handle
            .fetch(&[refspec], Some(&mut opts), None)
            .map_err(|e| GitError::FetchFailed {
                remote: remote.to_string(),
                message: e.message().to_string(),
            })
    }

    // =========================================================================
    // Remote URL Parsing
    // =========================================================================

    /// Parse a remote URL into an (owner, name) pair.
    ///
    /// Handles HTTPS, SSH, and scp-like URL forms:
    ///
    /// ```
    /// use tether::git::Git;
    ///
    /// assert_eq!(
    ///     Git::parse_owner_repo("https://github.com/owner/repo.git"),
    ///     Some(("owner".to_string(), "repo".to_string()))
    /// );
    /// assert_eq!(
    ///     Git::parse_owner_repo("git@github.com:owner/repo.git"),
    ///     Some(("owner".to_string(), "repo".to_string()))
    /// );
    /// assert_eq!(Git::parse_owner_repo("not-a-url"), None);
    /// ```
    pub fn parse_owner_repo(url: &str) -> Option<(String, String)> {
        let path = if let Some((_, after)) = url.split_once("://") {
            // https://host/owner/repo or ssh://git@host/owner/repo
            after.split_once('/')?.1
        } else if let Some((_, after)) = url.split_once(':') {
            // scp-like: git@host:owner/repo
            after
        } else {
            return None;
        };

        let path = path.strip_suffix(".git").unwrap_or(path);
        let path = path.trim_end_matches('/');

        let (owner_path, repo) = path.rsplit_once('/')?;
        let owner = owner_path.rsplit('/').next()?;

        if owner.is_empty() || repo.is_empty() {
            return None;
        }
        Some((owner.to_string(), repo.to_string()))
    }

    /// Compare two remote URLs for equivalence. Trailing `.git` and `/`
    /// are insignificant.
    pub fn urls_match(a: &str, b: &str) -> bool {
        normalize_url(a) == normalize_url(b)
    }
}

/// Normalize a remote URL for equality comparison.
fn normalize_url(url: &str) -> String {
    let url = url.trim_end_matches('/');
    url.strip_suffix(".git").unwrap_or(url).to_string()
}
