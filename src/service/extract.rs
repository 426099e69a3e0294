//! service::extract
//!
//! Materializing file contents at arbitrary commits into stable temporary
//! artifacts, for side-by-side diff tooling.
//!
//! Artifacts live under `<system temp dir>/tether-extract/` and are keyed
//! by `sha256(commit ‖ NUL ‖ path)`, so repeated extractions of the same
//! (commit, path) pair are idempotent and short-circuit to the existing
//! file. Content is immutable once extracted for a given key; artifacts
//! are owned by the caller for cleanup.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::core::types::Oid;
use crate::git::Git;
use crate::service::SyncError;

/// Directory under the system temp dir holding extracted artifacts.
const EXTRACT_DIR: &str = "tether-extract";

/// Conventional pull request template locations, checked in order.
const TEMPLATE_CANDIDATES: &[&str] = &[
    ".github/PULL_REQUEST_TEMPLATE.md",
    ".github/PULL_REQUEST_TEMPLATE",
    "PULL_REQUEST_TEMPLATE.md",
    "PULL_REQUEST_TEMPLATE",
    "docs/PULL_REQUEST_TEMPLATE.md",
    "docs/PULL_REQUEST_TEMPLATE",
];

/// Compute the stable artifact path for a (commit, file) pair.
///
/// The basename of the original file is kept so diff tooling shows a
/// meaningful name; a 12-hex-char content key makes the path unique per
/// (commit, path) without depending on hasher internals that could change
/// between builds.
pub(crate) fn artifact_path(commit: &Oid, file_name: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(commit.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(file_name.as_bytes());
    let key = hex::encode(&hasher.finalize()[..6]);

    let basename = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file");

    std::env::temp_dir()
        .join(EXTRACT_DIR)
        .join(format!("{key}-{basename}"))
}

/// Extract the blob for `file_name` at `commit` into a stable temporary
/// artifact, returning its path.
///
/// Idempotent: if the artifact already exists the read is skipped entirely.
///
/// # Errors
///
/// - [`SyncError::RevisionNotFound`] if the commit is not in the local
///   object store (callers should fetch first)
/// - [`SyncError::FileNotFoundAtRevision`] if the path does not exist in
///   that commit's tree
pub(crate) async fn extract_file(
    git: &Git,
    commit: &Oid,
    file_name: &str,
) -> Result<PathBuf, SyncError> {
    let path = artifact_path(commit, file_name);
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        log::debug!("extract cache hit for {file_name} at {}", commit.short(7));
        return Ok(path);
    }

    let content = git.blob_at_path(commit, file_name)?;
    write_artifact(&path, &content).await?;
    Ok(path)
}

/// Extract a file like [`extract_file`], but yield an empty artifact when
/// the path does not exist at the commit.
///
/// This is what diff display needs for pure additions and deletions: the
/// missing side renders as an empty file, not an error.
pub(crate) async fn extract_file_or_empty(
    git: &Git,
    commit: &Oid,
    file_name: &str,
) -> Result<PathBuf, SyncError> {
    match extract_file(git, commit, file_name).await {
        Ok(path) => Ok(path),
        Err(SyncError::FileNotFoundAtRevision { .. }) => {
            let path = artifact_path(commit, file_name);
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                write_artifact(&path, &[]).await?;
            }
            Ok(path)
        }
        Err(e) => Err(e),
    }
}

/// Write artifact content atomically: to a process-unique sibling first,
/// then rename into place, so concurrent extractors never observe a
/// half-written artifact.
async fn write_artifact(path: &Path, content: &[u8]) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".tmp{}", std::process::id()));
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Read the repository's pull request template, if one exists.
///
/// Absence is a normal empty result, not an error.
pub(crate) fn pull_request_template(work_dir: &Path) -> Option<String> {
    for candidate in TEMPLATE_CANDIDATES {
        let path = work_dir.join(candidate);
        if let Ok(content) = std::fs::read_to_string(&path) {
            return Some(content);
        }
    }
    None
}
