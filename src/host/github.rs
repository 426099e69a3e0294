//! host::github
//!
//! GitHub implementation of the remote pull-request accessor, using the
//! REST API via `reqwest`.
//!
//! # Authentication
//!
//! A pre-acquired bearer token may be supplied; unauthenticated clients
//! work against public repositories within GitHub's anonymous rate limits.
//! Token acquisition and refresh are the caller's concern.
//!
//! # Rate Limiting
//!
//! Rate-limit responses surface as [`HostError::RateLimited`]; this client
//! never retries automatically.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::traits::{CreatePrRequest, HostClient, HostError, PrSide, RemotePullRequest, RepoRef};

/// Default GitHub API base URL.
const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "tether";

/// GitHub pull-request accessor.
pub struct GitHubHost {
    /// HTTP client for making requests
    client: Client,
    /// Optional bearer token
    token: Option<String>,
    /// Repository owner (user or organization)
    owner: String,
    /// Repository name
    repo: String,
    /// API base URL (configurable for GitHub Enterprise and tests)
    api_base: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubHost")
            .field("has_token", &self.token.is_some())
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitHubHost {
    /// Create a new GitHub accessor for `owner/repo`.
    pub fn new(
        token: Option<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            token,
            owner: owner.into(),
            repo: repo.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Create a GitHub accessor with a custom API base URL.
    ///
    /// Use this for GitHub Enterprise installations
    /// (e.g. `https://github.example.com/api/v3`) and in tests.
    pub fn with_api_base(
        token: Option<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            token,
            owner: owner.into(),
            repo: repo.into(),
            api_base: api_base.into(),
        }
    }

    /// Get the repository owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get the repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Build common headers for API requests.
    fn headers(&self) -> Result<HeaderMap, HostError> {
        let mut headers = HeaderMap::new();
        if let Some(ref token) = self.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| HostError::AuthFailed("token contains invalid characters".into()))?;
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.owner, self.repo, path
        )
    }

    /// Handle an API response, mapping error statuses to [`HostError`].
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<T, HostError> {
        let status = response.status();

        if status.is_success() {
            return response.json().await.map_err(|e| HostError::ApiError {
                status: status.as_u16(),
                message: format!("failed to parse response: {e}"),
            });
        }

        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "unknown error".to_string(),
        };

        Err(match status {
            StatusCode::UNAUTHORIZED => HostError::AuthFailed("invalid or expired token".into()),
            StatusCode::FORBIDDEN => {
                // GitHub reports primary rate limiting as 403
                if message.to_lowercase().contains("rate limit") {
                    HostError::RateLimited
                } else {
                    HostError::AuthFailed(message)
                }
            }
            StatusCode::NOT_FOUND => HostError::ApiError {
                status: 404,
                message,
            },
            StatusCode::TOO_MANY_REQUESTS => HostError::RateLimited,
            _ => HostError::ApiError {
                status: status.as_u16(),
                message,
            },
        })
    }
}

#[async_trait]
impl HostClient for GitHubHost {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn get_pull_request(&self, number: u64) -> Result<RemotePullRequest, HostError> {
        let url = self.repo_url(&format!("pulls/{number}"));
        let response = self
            .client
            .get(&url)
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| HostError::NetworkError(e.to_string()))?;

        let pr: GitHubPullRequest = match self.handle_response(response).await {
            Ok(pr) => pr,
            Err(HostError::ApiError { status: 404, .. }) => {
                return Err(HostError::PullRequestNotFound(number));
            }
            Err(e) => return Err(e),
        };

        Ok(pr.into())
    }

    async fn create_pull_request(
        &self,
        request: CreatePrRequest,
    ) -> Result<RemotePullRequest, HostError> {
        if self.token.is_none() {
            return Err(HostError::AuthRequired);
        }

        let url = self.repo_url("pulls");
        let payload = CreatePullBody {
            title: &request.title,
            head: &request.head,
            base: &request.base,
            body: request.body.as_deref(),
            draft: request.draft,
        };

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&payload)
            .send()
            .await
            .map_err(|e| HostError::NetworkError(e.to_string()))?;

        let pr: GitHubPullRequest = self.handle_response(response).await?;
        Ok(pr.into())
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct CreatePullBody<'a> {
    title: &'a str,
    head: &'a str,
    base: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    draft: bool,
}

#[derive(Debug, Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GitHubPullRequest {
    number: u64,
    title: String,
    body: Option<String>,
    head: GitHubPrSide,
    base: GitHubPrSide,
}

#[derive(Debug, Deserialize)]
struct GitHubPrSide {
    #[serde(rename = "ref")]
    branch: String,
    sha: String,
    repo: Option<GitHubRepo>,
}

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    name: String,
    clone_url: String,
    owner: GitHubOwner,
}

#[derive(Debug, Deserialize)]
struct GitHubOwner {
    login: String,
}

impl From<GitHubPullRequest> for RemotePullRequest {
    fn from(pr: GitHubPullRequest) -> Self {
        RemotePullRequest {
            number: pr.number,
            title: pr.title,
            body: pr.body,
            head: pr.head.into(),
            base: pr.base.into(),
        }
    }
}

impl From<GitHubPrSide> for PrSide {
    fn from(side: GitHubPrSide) -> Self {
        PrSide {
            branch: side.branch,
            sha: side.sha,
            repo: side.repo.map(|repo| RepoRef {
                owner: repo.owner.login,
                name: repo.name,
                clone_url: repo.clone_url,
            }),
        }
    }
}
