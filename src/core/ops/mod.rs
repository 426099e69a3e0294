//! core::ops
//!
//! Operation-level machinery: the exclusive repository lock that serializes
//! mutating operations.

pub mod lock;

pub use lock::{LockError, RepoLock};
