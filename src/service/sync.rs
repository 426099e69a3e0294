//! service::sync
//!
//! The pull request synchronization orchestrator.
//!
//! [`PullRequestService`] coordinates the local Git repository (via the
//! [`Git`] doorway) and the remote pull-request accessor (via
//! [`HostClient`]). Every operation takes the repository path explicitly
//! and re-resolves repository state on entry; no handles or snapshots are
//! cached across calls, and no ambient "current repository" exists, so
//! operations against different repositories proceed fully independently.
//!
//! # Concurrency
//!
//! Mutating operations (fetch-and-checkout, switch, pull, unmark) hold the
//! repository lock for their duration and fail fast with
//! [`SyncError::Locked`] when another mutation is in flight. Read-only
//! operations take no lock.

use std::path::{Path, PathBuf};

use crate::core::config::RepoConfig;
use crate::core::naming;
use crate::core::ops::RepoLock;
use crate::core::paths::SyncPaths;
use crate::core::types::{BranchName, Oid, RefName};
use crate::git::{Git, GitError, LocalBranch};
use crate::host::{CreatePrRequest, HostClient, RemotePullRequest, RepoRef};
use crate::service::association::{AssociationStore, PrAssociation};
use crate::service::divergence::{self, HistoryDivergence};
use crate::service::extract;
use crate::service::SyncError;

/// The pull request synchronization service.
///
/// Holds only the host client; all repository state is taken per call.
#[derive(Debug)]
pub struct PullRequestService<H: HostClient> {
    host: H,
}

impl<H: HostClient> PullRequestService<H> {
    /// Create a service over the given host client.
    pub fn new(host: H) -> Self {
        Self { host }
    }

    /// Access the underlying host client.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Open the repository and load its configuration.
    fn open(repo: &Path) -> Result<(Git, SyncPaths, RepoConfig), SyncError> {
        let git = Git::open(repo)?;
        let paths = SyncPaths::from_repo_info(&git.info()?);
        let config = RepoConfig::load(&paths)?;
        Ok((git, paths, config))
    }

    // =========================================================================
    // Cleanliness
    // =========================================================================

    /// Check whether the repository is in a state that allows a checkout:
    /// no staged or unstaged changes, no conflicts, and no in-progress
    /// merge/rebase/cherry-pick. Never mutates anything; safe to call
    /// repeatedly and concurrently.
    pub async fn is_clean_for_checkout(&self, repo: &Path) -> Result<bool, SyncError> {
        let git = Git::open(repo)?;
        Ok(git.is_clean_for_checkout()?)
    }

    // =========================================================================
    // Branch Resolution
    // =========================================================================

    /// Derive the default local branch name for a pull request, avoiding
    /// clashes with existing branches.
    ///
    /// Deterministic given identical inputs and identical existing-branch
    /// state; branches already associated with this pull request are not
    /// counted as collisions.
    pub async fn default_local_branch_name(
        &self,
        repo: &Path,
        number: u64,
        title: &str,
    ) -> Result<String, SyncError> {
        let (git, _paths, config) = Self::open(repo)?;

        let existing: Vec<BranchName> = git
            .list_branches()?
            .into_iter()
            .map(|b| b.name)
            .collect();
        let store = AssociationStore::new(&git);
        let associated: Vec<BranchName> = store
            .list()?
            .into_iter()
            .filter(|(_, a)| a.number == number)
            .map(|(branch, _)| branch)
            .collect();

        let name = naming::default_local_branch_name(
            &config.branch.prefix,
            number,
            title,
            config.branch.max_slug_length,
            &existing,
            &associated,
        )?;
        Ok(name.to_string())
    }

    /// List the local branches associated with a pull request.
    ///
    /// Scans recorded associations first, then falls back to branches whose
    /// upstream tracks the pull request's head. The returned sequence is
    /// finite and restartable (each call re-scans), ordered most recently
    /// used first.
    pub async fn local_branches(
        &self,
        repo: &Path,
        pr: &RemotePullRequest,
    ) -> Result<impl Iterator<Item = LocalBranch>, SyncError> {
        let git = Git::open(repo)?;
        let store = AssociationStore::new(&git);

        let branches = git.list_branches()?;
        let associations = store.list()?;
        let remotes = git.remotes()?;

        // Associated branches, most recently used first
        let mut associated: Vec<(chrono::DateTime<chrono::Utc>, LocalBranch)> = Vec::new();
        // Fallback: branches whose upstream tracks the PR head
        let mut tracking: Vec<LocalBranch> = Vec::new();

        for branch in branches {
            let association = associations
                .iter()
                .find(|(name, _)| *name == branch.name)
                .map(|(_, a)| a);

            if let Some(association) = association {
                if association.number == pr.number {
                    associated.push((association.updated_at, branch));
                }
                continue;
            }

            if Self::tracks_pr_head(&branch, pr, &remotes) {
                tracking.push(branch);
            }
        }

        associated.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(associated
            .into_iter()
            .map(|(_, branch)| branch)
            .chain(tracking))
    }

    /// Check if a branch's upstream points at the pull request's head.
    fn tracks_pr_head(
        branch: &LocalBranch,
        pr: &RemotePullRequest,
        remotes: &[crate::git::RemoteInfo],
    ) -> bool {
        let Some(upstream) = &branch.upstream else {
            return false;
        };
        if upstream.branch != pr.head.branch {
            return false;
        }
        let Some(head_repo) = &pr.head.repo else {
            return false;
        };
        let Some(url) = remotes
            .iter()
            .find(|r| r.name == upstream.remote)
            .and_then(|r| r.url.as_deref())
        else {
            return false;
        };
        Self::remote_points_at(url, head_repo)
    }

    /// Check if a remote URL refers to the given hosted repository, either
    /// by exact URL or by parsed owner/name.
    fn remote_points_at(url: &str, repo: &RepoRef) -> bool {
        if Git::urls_match(url, &repo.clone_url) {
            return true;
        }
        Git::parse_owner_repo(url)
            .map(|(owner, name)| repo.matches(&owner, &name))
            .unwrap_or(false)
    }

    /// Determine whether the pull request comes from a fork: its source
    /// repository differs from every configured remote of the local
    /// repository.
    ///
    /// Pure comparison of already-resolved metadata; performs no network
    /// I/O. A pull request whose source repository was deleted is treated
    /// as not-from-fork since there is nothing left to fetch from.
    pub fn is_from_fork(&self, repo: &Path, pr: &RemotePullRequest) -> Result<bool, SyncError> {
        let git = Git::open(repo)?;
        Self::is_from_fork_inner(&git, pr)
    }

    fn is_from_fork_inner(git: &Git, pr: &RemotePullRequest) -> Result<bool, SyncError> {
        let Some(head_repo) = &pr.head.repo else {
            return Ok(false);
        };

        for remote in git.remotes()? {
            let Some(url) = &remote.url else { continue };
            if Self::remote_points_at(url, head_repo) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // =========================================================================
    // Fetch and Checkout
    // =========================================================================

    /// Fetch a pull request's head into a local branch and check it out.
    ///
    /// Guarantees, in order:
    ///
    /// 1. Pull request metadata is resolved from the host.
    /// 2. Fork-sourced pull requests get a remote pointing at the fork's
    ///    clone URL; an existing remote with that URL is reused, and new
    ///    ones are named deterministically from the fork owner.
    /// 3. Only the head ref is fetched, not the whole remote.
    /// 4. The local branch is created at the head commit, or fast-forwarded
    ///    if it already exists; divergence fails with
    ///    [`SyncError::NonFastForward`] rather than discarding commits.
    /// 5. Checkout requires cleanliness and fails with
    ///    [`SyncError::DirtyWorkingTree`] otherwise. A failure at this
    ///    stage leaves the branch ref created and HEAD unchanged, and is
    ///    reported distinctly from a fetch failure.
    /// 6. The branch-to-pull-request association is recorded.
    pub async fn fetch_and_checkout(
        &self,
        repo: &Path,
        number: u64,
        local_branch_name: &str,
    ) -> Result<(), SyncError> {
        let (git, paths, config) = Self::open(repo)?;
        let _lock = RepoLock::acquire(&paths)?;

        let pr = self.host.get_pull_request(number).await?;
        log::info!(
            "fetching pull request #{number} ({}) into {local_branch_name}",
            pr.title
        );

        // Fetch stage
        let remote_name = Self::ensure_source_remote(&git, &config, &pr)?;
        let head_oid = Self::fetch_pr_head(&git, &remote_name, &pr)?;

        let branch = BranchName::new(local_branch_name)?;
        if git.current_branch()?.as_ref() == Some(&branch) {
            // Fast-forwarding the checked-out branch moves the working
            // tree too, so the worktree is updated before the ref
            if let Some(tip) = git.branch_tip(&branch)? {
                if tip != head_oid {
                    if !git.is_ancestor(&tip, &head_oid)? {
                        return Err(SyncError::NonFastForward(branch.to_string()));
                    }
                    Self::require_clean(&git)?;
                    git.fast_forward_current_branch(&head_oid)
                        .map_err(Self::checkout_stage_error)?;
                }
            }
        } else {
            // Branch stage
            git.create_or_fast_forward_branch(&branch, &head_oid)?;

            // Checkout stage: failures from here on leave the branch ref
            // in place so the caller can retry without re-fetching
            Self::require_clean(&git)?;
            git.checkout_branch(&branch)
                .map_err(Self::checkout_stage_error)?;
        }

        // Record provenance
        let (owner, repo_name) = pr
            .head
            .repo
            .as_ref()
            .map(|r| (r.owner.clone(), r.name.clone()))
            .unwrap_or_default();
        let store = AssociationStore::new(&git);
        store.write(&branch, &PrAssociation::new(number, remote_name, owner, repo_name))?;

        log::info!("checked out {branch} at {}", head_oid.short(7));
        Ok(())
    }

    /// Ensure a remote exists for the pull request's source repository and
    /// return its name.
    ///
    /// Reuses any remote already pointing at the source repository (by
    /// owner/name or by URL); otherwise adds one named
    /// `<fork_prefix><owner>`, disambiguating numerically if that name is
    /// taken by a remote with a different URL. Never duplicates remotes
    /// for the same URL.
    fn ensure_source_remote(
        git: &Git,
        config: &RepoConfig,
        pr: &RemotePullRequest,
    ) -> Result<String, SyncError> {
        let head_repo = Self::head_repo(pr)?;

        for remote in git.remotes()? {
            let Some(url) = &remote.url else { continue };
            if Self::remote_points_at(url, head_repo) {
                return Ok(remote.name);
            }
        }

        let base = format!(
            "{}{}",
            config.remote.fork_prefix,
            head_repo.owner.to_lowercase()
        );
        let mut candidate = base.clone();
        let mut counter = 2u32;
        loop {
            match git.add_remote(&candidate, &head_repo.clone_url) {
                Ok(()) => {
                    log::debug!("added remote {candidate} -> {}", head_repo.clone_url);
                    return Ok(candidate);
                }
                Err(GitError::RemoteExists { .. }) => {
                    candidate = format!("{base}-{counter}");
                    counter += 1;
                }
                Err(e) => return Err(SyncError::Fetch(e.to_string())),
            }
        }
    }

    /// Fail with [`SyncError::DirtyWorkingTree`] unless the repository
    /// allows a checkout.
    fn require_clean(git: &Git) -> Result<(), SyncError> {
        if git.is_clean_for_checkout()? {
            return Ok(());
        }
        let status = git.worktree_status(false)?;
        let state = git.state();
        let details = if state.is_in_progress() {
            format!("{state} in progress")
        } else {
            format!("{} staged, {} unstaged changes", status.staged, status.unstaged)
        };
        Err(SyncError::DirtyWorkingTree(details))
    }

    /// Map checkout-stage git failures: blocked worktrees keep their own
    /// variant, everything else marks the stage so callers know the fetch
    /// already succeeded.
    fn checkout_stage_error(err: GitError) -> SyncError {
        match err {
            GitError::DirtyWorktree { details } => SyncError::DirtyWorkingTree(details),
            other => SyncError::Checkout(other.to_string()),
        }
    }

    fn head_repo(pr: &RemotePullRequest) -> Result<&RepoRef, SyncError> {
        pr.head.repo.as_ref().ok_or_else(|| {
            SyncError::Fetch(format!(
                "source repository of pull request #{} no longer exists",
                pr.number
            ))
        })
    }

    /// Fetch the pull request's head branch from `remote` and return the
    /// head commit OID, verifying it is present locally afterwards.
    fn fetch_pr_head(
        git: &Git,
        remote: &str,
        pr: &RemotePullRequest,
    ) -> Result<Oid, SyncError> {
        let refspec = format!(
            "+refs/heads/{branch}:refs/remotes/{remote}/{branch}",
            branch = pr.head.branch
        );
        git.fetch_ref(remote, &refspec)?;

        let head_oid = Oid::new(pr.head.sha.as_str())?;
        if !git.commit_exists(&head_oid) {
            // The branch moved since the snapshot was taken; use whatever
            // the fetched ref points at now
            let tracking = RefName::for_remote_branch(remote, &pr.head.branch);
            return match git.try_resolve_ref(tracking.as_str())? {
                Some(oid) => Ok(oid),
                None => Err(SyncError::Fetch(format!(
                    "head commit {} not present after fetch",
                    head_oid.short(7)
                ))),
            };
        }
        Ok(head_oid)
    }

    /// Switch HEAD to an existing local branch for the pull request.
    ///
    /// Picks the most-preferred (most recently used) branch found by
    /// [`local_branches`](Self::local_branches); requires cleanliness.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NoLocalBranch`] when no branch exists — callers
    ///   should fall back to [`fetch_and_checkout`](Self::fetch_and_checkout)
    pub async fn switch_to_branch(
        &self,
        repo: &Path,
        pr: &RemotePullRequest,
    ) -> Result<(), SyncError> {
        let branch = self
            .local_branches(repo, pr)
            .await?
            .next()
            .ok_or(SyncError::NoLocalBranch(pr.number))?;

        let (git, paths, _config) = Self::open(repo)?;
        let _lock = RepoLock::acquire(&paths)?;

        Self::require_clean(&git)?;
        git.checkout_branch(&branch.name)?;

        log::info!("switched to {} for #{}", branch.name, pr.number);
        Ok(())
    }

    // =========================================================================
    // Pull
    // =========================================================================

    /// Fast-forward the current branch from its configured upstream.
    ///
    /// Never merges: diverged histories fail with
    /// [`SyncError::NonFastForward`].
    ///
    /// # Errors
    ///
    /// - [`SyncError::NoUpstream`] if the current branch tracks nothing
    /// - [`SyncError::NonFastForward`] if histories have diverged
    pub async fn pull(&self, repo: &Path) -> Result<(), SyncError> {
        let (git, paths, _config) = Self::open(repo)?;
        let _lock = RepoLock::acquire(&paths)?;

        let branch = git.current_branch()?.ok_or(SyncError::NoUpstream)?;
        let upstream = git
            .branch_upstream(&branch)?
            .ok_or(SyncError::NoUpstream)?;

        let refspec = format!(
            "+refs/heads/{remote_branch}:{tracking}",
            remote_branch = upstream.branch,
            tracking = upstream.tracking_ref
        );
        git.fetch_ref(&upstream.remote, &refspec)?;

        let local = git.head_oid()?;
        let remote = git.resolve_ref(upstream.tracking_ref.as_str())?;

        if local == remote {
            log::debug!("{branch} is already up to date");
            return Ok(());
        }
        if !git.is_ancestor(&local, &remote)? {
            return Err(SyncError::NonFastForward(branch.to_string()));
        }

        git.fast_forward_current_branch(&remote)?;
        log::info!("fast-forwarded {branch} to {}", remote.short(7));
        Ok(())
    }

    // =========================================================================
    // Association Management
    // =========================================================================

    /// Remove the association between the current branch and a pull
    /// request, if any. Idempotent: a branch without an association is a
    /// no-op, not an error.
    pub async fn unmark_local_branch(&self, repo: &Path) -> Result<(), SyncError> {
        let (git, paths, _config) = Self::open(repo)?;
        let _lock = RepoLock::acquire(&paths)?;

        let Some(branch) = git.current_branch()? else {
            return Ok(()); // Detached HEAD: nothing to unmark
        };

        let store = AssociationStore::new(&git);
        if store.delete(&branch)? {
            log::info!("unmarked {branch}");
        }
        Ok(())
    }

    // =========================================================================
    // Pull Request Creation
    // =========================================================================

    /// Create a pull request on the hosting service.
    pub async fn create_pull_request(
        &self,
        repo: &Path,
        request: CreatePrRequest,
    ) -> Result<RemotePullRequest, SyncError> {
        // Validate the repository handle even though creation is remote-only
        let _git = Git::open(repo)?;
        Ok(self.host.create_pull_request(request).await?)
    }

    // =========================================================================
    // Divergence
    // =========================================================================

    /// Compute ahead/behind divergence between the current HEAD and the
    /// pull request's base branch.
    ///
    /// The base ref is re-resolved on every call, so a force-pushed or
    /// rebased base is reflected rather than any stale snapshot.
    ///
    /// # Errors
    ///
    /// - [`SyncError::RefNotFound`] if the base ref cannot be resolved
    ///   locally — callers should fetch first
    pub async fn calculate_history_divergence(
        &self,
        repo: &Path,
        number: u64,
    ) -> Result<HistoryDivergence, SyncError> {
        let git = Git::open(repo)?;
        let pr = self.host.get_pull_request(number).await?;
        divergence::calculate(&git, &pr)
    }

    // =========================================================================
    // File Extraction
    // =========================================================================

    /// Extract the content of `file_name` at `commit_sha` into a stable
    /// temporary artifact and return its path.
    ///
    /// Idempotent per (commit, file) key: repeat requests return the same
    /// artifact with byte-identical content.
    pub async fn extract_file(
        &self,
        repo: &Path,
        commit_sha: &str,
        file_name: &str,
    ) -> Result<PathBuf, SyncError> {
        let git = Git::open(repo)?;
        let commit = Oid::new(commit_sha)?;
        extract::extract_file(&git, &commit, file_name).await
    }

    /// Extract the "before" and "after" versions of a file for diff
    /// display: `(left, right)` where left is the content at the pull
    /// request's base commit and right at its head commit.
    ///
    /// A file missing on either side (pure addition or deletion) yields a
    /// well-defined empty artifact, not an error. For fork-sourced pull
    /// requests the head commit is fetched from the fork remote first if
    /// it is not yet locally available.
    pub async fn extract_diff_files(
        &self,
        repo: &Path,
        pr: &RemotePullRequest,
        file_name: &str,
    ) -> Result<(PathBuf, PathBuf), SyncError> {
        let (git, _paths, config) = Self::open(repo)?;

        let base = Oid::new(pr.base.sha.as_str())?;
        let head = Oid::new(pr.head.sha.as_str())?;

        if !git.commit_exists(&head) && Self::is_from_fork_inner(&git, pr)? {
            let remote = Self::ensure_source_remote(&git, &config, pr)?;
            Self::fetch_pr_head(&git, &remote, pr)?;
        }

        let left = extract::extract_file_or_empty(&git, &base, file_name).await?;
        let right = extract::extract_file_or_empty(&git, &head, file_name).await?;
        Ok((left, right))
    }

    /// Read the repository's pull request template, if present.
    ///
    /// Absence is a normal empty result, not an error.
    pub async fn pull_request_template(&self, repo: &Path) -> Result<Option<String>, SyncError> {
        let git = Git::open(repo)?;
        let info = git.info()?;
        Ok(extract::pull_request_template(&info.work_dir))
    }
}
