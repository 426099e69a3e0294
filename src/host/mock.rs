//! host::mock
//!
//! Mock host implementation for deterministic testing.
//!
//! Stores pull requests in memory, records every operation, and allows
//! configuring per-operation failures.
//!
//! # Example
//!
//! ```
//! use tether::host::mock::MockHost;
//! use tether::host::{HostClient, PrSide, RemotePullRequest};
//!
//! # tokio_test::block_on(async {
//! let pr = RemotePullRequest {
//!     number: 42,
//!     title: "Fix login bug".to_string(),
//!     body: None,
//!     head: PrSide {
//!         branch: "fix-login".to_string(),
//!         sha: "a".repeat(40),
//!         repo: None,
//!     },
//!     base: PrSide {
//!         branch: "main".to_string(),
//!         sha: "b".repeat(40),
//!         repo: None,
//!     },
//! };
//!
//! let host = MockHost::with_pull_requests(vec![pr]);
//! let fetched = host.get_pull_request(42).await.unwrap();
//! assert_eq!(fetched.title, "Fix login bug");
//! # });
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::traits::{CreatePrRequest, HostClient, HostError, PrSide, RemotePullRequest};

/// Which operation should fail, and how.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail get_pull_request with the given error.
    GetPullRequest(HostError),
    /// Fail create_pull_request with the given error.
    CreatePullRequest(HostError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone)]
pub enum MockOperation {
    GetPullRequest { number: u64 },
    CreatePullRequest { head: String, base: String, title: String },
}

#[derive(Debug)]
struct MockHostInner {
    prs: HashMap<u64, RemotePullRequest>,
    next_number: u64,
    fail_on: Option<FailOn>,
    operations: Vec<MockOperation>,
}

/// Mock host for testing. Thread-safe; clones share state.
#[derive(Debug, Clone)]
pub struct MockHost {
    inner: Arc<Mutex<MockHostInner>>,
}

impl MockHost {
    /// Create a new empty mock host.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockHostInner {
                prs: HashMap::new(),
                next_number: 1,
                fail_on: None,
                operations: Vec::new(),
            })),
        }
    }

    /// Create a mock host with pre-existing pull requests.
    pub fn with_pull_requests(prs: Vec<RemotePullRequest>) -> Self {
        let max_number = prs.iter().map(|p| p.number).max().unwrap_or(0);
        let prs: HashMap<u64, RemotePullRequest> =
            prs.into_iter().map(|p| (p.number, p)).collect();

        Self {
            inner: Arc::new(Mutex::new(MockHostInner {
                prs,
                next_number: max_number + 1,
                fail_on: None,
                operations: Vec::new(),
            })),
        }
    }

    /// Configure the mock to fail on a specific operation.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.inner.lock().unwrap().fail_on = Some(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.inner.lock().unwrap().fail_on = None;
    }

    /// Replace a stored pull request (e.g. to simulate a force-pushed base).
    pub fn update_pull_request(&self, pr: RemotePullRequest) {
        self.inner.lock().unwrap().prs.insert(pr.number, pr);
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().unwrap().operations.clone()
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostClient for MockHost {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn get_pull_request(&self, number: u64) -> Result<RemotePullRequest, HostError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .operations
            .push(MockOperation::GetPullRequest { number });

        if let Some(FailOn::GetPullRequest(err)) = &inner.fail_on {
            return Err(err.clone());
        }

        inner
            .prs
            .get(&number)
            .cloned()
            .ok_or(HostError::PullRequestNotFound(number))
    }

    async fn create_pull_request(
        &self,
        request: CreatePrRequest,
    ) -> Result<RemotePullRequest, HostError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::CreatePullRequest {
            head: request.head.clone(),
            base: request.base.clone(),
            title: request.title.clone(),
        });

        if let Some(FailOn::CreatePullRequest(err)) = &inner.fail_on {
            return Err(err.clone());
        }

        let number = inner.next_number;
        inner.next_number += 1;

        let pr = RemotePullRequest {
            number,
            title: request.title,
            body: request.body,
            head: PrSide {
                branch: request.head,
                sha: "0".repeat(40),
                repo: None,
            },
            base: PrSide {
                branch: request.base,
                sha: "0".repeat(40),
                repo: None,
            },
        };
        inner.prs.insert(number, pr.clone());

        Ok(pr)
    }
}
