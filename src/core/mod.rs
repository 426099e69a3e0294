//! core
//!
//! Core domain types and policies.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, RefName
//! - [`naming`] - Deriving local branch names for pull requests
//! - [`paths`] - Centralized path routing for tether storage
//! - [`config`] - Repository-local configuration
//! - [`ops`] - Repository locking

pub mod config;
pub mod naming;
pub mod ops;
pub mod paths;
pub mod types;
