//! Tether - reconciles a local git working copy with remote pull requests
//!
//! Tether lets a client fetch a pull request's commits into a local branch,
//! check it out safely, detect divergence from the base branch, and extract
//! file contents at specific revisions for diff display. The hosting-service
//! API and the git object model are thin external collaborators; the value
//! is the coordination logic between them: mapping pull requests to local
//! branches without collisions, gating destructive operations on repository
//! cleanliness, computing ahead/behind divergence across history rewrites,
//! and materializing historical file versions (including fork-sourced
//! content) without touching the working tree.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`service`] - The synchronization service (orchestration, divergence,
//!   associations, file extraction)
//! - [`core`] - Domain types, naming policy, configuration, and locking
//! - [`git`] - Single interface for all Git operations
//! - [`host`] - Abstraction for the remote pull-request accessor (GitHub v1)
//!
//! # Correctness Invariants
//!
//! 1. Mutating operations on one repository are serialized by an exclusive
//!    repository lock
//! 2. Branch updates are fast-forward only; local commits are never
//!    silently discarded
//! 3. Checkouts are gated on working-tree cleanliness and use safe mode,
//!    so a failed checkout leaves the previous state fully intact
//! 4. Every failure surfaces as a distinct, actionable error variant
//!
//! # Example
//!
//! ```ignore
//! use tether::host::github::GitHubHost;
//! use tether::service::PullRequestService;
//! use std::path::Path;
//!
//! let host = GitHubHost::new(token, "octocat", "hello-world");
//! let service = PullRequestService::new(host);
//!
//! let name = service
//!     .default_local_branch_name(repo, 42, "Fix login bug")
//!     .await?;
//! service.fetch_and_checkout(repo, 42, &name).await?;
//! ```

pub mod core;
pub mod git;
pub mod host;
pub mod service;
