//! service::divergence
//!
//! Ahead/behind computation between the current HEAD and a pull request's
//! base branch.
//!
//! The base ref is resolved fresh on every call: the remote-tracking ref of
//! whichever remote hosts the base repository is preferred, with a local
//! branch of the same name as fallback. Nothing is cached, so a base branch
//! that was force-pushed or rebased since the pull request opened is
//! reflected as soon as its tracking ref moves.

use crate::core::types::{BranchName, Oid, RefName};
use crate::git::Git;
use crate::host::RemotePullRequest;
use crate::service::SyncError;

/// Computed divergence between two refs.
///
/// `ahead` counts commits reachable from HEAD but not from the merge base;
/// `behind` counts commits reachable from the base ref but not from the
/// merge base. For identical refs both counts are zero and the merge base
/// equals the shared commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryDivergence {
    /// Commits unique to the local HEAD
    pub ahead: usize,
    /// Commits unique to the base ref
    pub behind: usize,
    /// The most recent common ancestor; `None` for unrelated histories
    pub merge_base: Option<Oid>,
}

/// Compute divergence between the current HEAD and the pull request's base.
pub(crate) fn calculate(
    git: &Git,
    pr: &RemotePullRequest,
) -> Result<HistoryDivergence, SyncError> {
    let head = git.head_oid()?;
    let base = resolve_base_ref(git, pr)?;

    let merge_base = git.merge_base(&head, &base)?;
    let (ahead, behind) = git.ahead_behind(&head, &base)?;

    Ok(HistoryDivergence {
        ahead,
        behind,
        merge_base,
    })
}

/// Resolve the pull request's base branch to a local OID.
///
/// Preference order: the remote-tracking ref of a remote pointing at the
/// base repository, then a local branch with the base branch's name.
fn resolve_base_ref(git: &Git, pr: &RemotePullRequest) -> Result<Oid, SyncError> {
    if let Some(base_repo) = &pr.base.repo {
        for remote in git.remotes()? {
            let Some(url) = &remote.url else { continue };
            let matches = Git::urls_match(url, &base_repo.clone_url)
                || Git::parse_owner_repo(url)
                    .map(|(owner, name)| base_repo.matches(&owner, &name))
                    .unwrap_or(false);
            if !matches {
                continue;
            }
            let tracking = RefName::for_remote_branch(&remote.name, &pr.base.branch);
            if let Some(oid) = git.try_resolve_ref(tracking.as_str())? {
                return Ok(oid);
            }
        }
    }

    if let Ok(branch) = BranchName::new(pr.base.branch.as_str()) {
        if let Some(oid) = git.branch_tip(&branch)? {
            return Ok(oid);
        }
    }

    Err(SyncError::RefNotFound(format!(
        "base branch {} is not available locally",
        pr.base.branch
    )))
}
