//! host::traits
//!
//! Trait definition for the remote pull-request accessor.
//!
//! # Design
//!
//! The `HostClient` trait is async because host operations involve network
//! I/O. The service composes these calls but never caches their results:
//! pull request snapshots are re-fetched per operation so divergence and
//! checkout decisions always reflect the hosting service's current state.
//!
//! Credential acquisition is out of scope; implementations take an
//! optional pre-acquired token.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from host operations.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    /// Authentication is required but not available.
    #[error("authentication required")]
    AuthRequired,

    /// Authentication failed (invalid token, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested pull request was not found.
    #[error("pull request not found: #{0}")]
    PullRequestNotFound(u64),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),
}

/// A reference to a hosted repository: owner/name plus its clone URL.
///
/// Used to tell the "origin" repository apart from fork repositories that
/// are the source of a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub name: String,
    /// HTTPS clone URL
    pub clone_url: String,
}

impl RepoRef {
    /// Check if this reference points at the same repository as an
    /// owner/name pair (case-insensitive, as hosting services are).
    pub fn matches(&self, owner: &str, name: &str) -> bool {
        self.owner.eq_ignore_ascii_case(owner) && self.name.eq_ignore_ascii_case(name)
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// One side (head or base) of a pull request.
#[derive(Debug, Clone)]
pub struct PrSide {
    /// Branch name in the owning repository
    pub branch: String,
    /// Commit id the side points at
    pub sha: String,
    /// The owning repository; `None` when the source repository has been
    /// deleted (the hosting service keeps the PR but loses the repo)
    pub repo: Option<RepoRef>,
}

/// An immutable snapshot of a pull request, as returned by the host.
#[derive(Debug, Clone)]
pub struct RemotePullRequest {
    /// PR number
    pub number: u64,
    /// PR title
    pub title: String,
    /// PR body/description
    pub body: Option<String>,
    /// The source side (the branch with changes)
    pub head: PrSide,
    /// The target side (the branch to merge into)
    pub base: PrSide,
}

/// Request to create a pull request.
#[derive(Debug, Clone)]
pub struct CreatePrRequest {
    /// Head branch name (the branch with changes)
    pub head: String,
    /// Base branch name (the branch to merge into)
    pub base: String,
    /// PR title
    pub title: String,
    /// PR body/description
    pub body: Option<String>,
    /// Create as draft
    pub draft: bool,
}

/// The remote pull-request accessor.
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
/// All failures surface as [`HostError`]; no method retries automatically —
/// callers decide whether to retry after a transient failure.
#[async_trait]
pub trait HostClient: Send + Sync {
    /// Get the host name (e.g., "github").
    fn name(&self) -> &'static str;

    /// Get a pull request snapshot by number.
    ///
    /// # Errors
    ///
    /// - [`HostError::PullRequestNotFound`] if the PR doesn't exist
    /// - [`HostError::NetworkError`] on transport failures
    async fn get_pull_request(&self, number: u64) -> Result<RemotePullRequest, HostError>;

    /// Create a new pull request.
    ///
    /// # Errors
    ///
    /// - [`HostError::AuthRequired`] if no authentication is configured
    /// - [`HostError::ApiError`] with status 422 if validation fails
    async fn create_pull_request(
        &self,
        request: CreatePrRequest,
    ) -> Result<RemotePullRequest, HostError>;
}
