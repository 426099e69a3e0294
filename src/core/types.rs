//! core::types
//!
//! Strong types for the domain: validated branch names, object ids, and
//! reference names. Invalid values cannot be constructed, which keeps the
//! rest of the crate free of ad-hoc string checks.
//!
//! # Examples
//!
//! ```
//! use tether::core::types::{BranchName, Oid, RefName};
//!
//! let branch = BranchName::new("pr/42-fix-login-bug").unwrap();
//! let refname = RefName::for_branch(&branch);
//! assert_eq!(refname.as_str(), "refs/heads/pr/42-fix-login-bug");
//!
//! assert!(BranchName::new("has space").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),
}

/// Validate a name against Git's refname rules (see `git check-ref-format`).
fn validate_ref_syntax(name: &str, what: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("{what} cannot be empty"));
    }
    if name == "@" {
        return Err(format!("{what} cannot be '@' (reserved)"));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(format!("{what} cannot start or end with '/'"));
    }
    if name.ends_with(".lock") {
        return Err(format!("{what} cannot end with '.lock'"));
    }
    for pattern in ["..", "@{", "//"] {
        if name.contains(pattern) {
            return Err(format!("{what} cannot contain '{pattern}'"));
        }
    }
    const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
    for c in INVALID_CHARS {
        if name.contains(c) {
            return Err(format!("{what} cannot contain '{c}'"));
        }
    }
    if name.chars().any(|c| c.is_ascii_control()) {
        return Err(format!("{what} cannot contain control characters"));
    }
    for component in name.split('/') {
        if component.starts_with('.') {
            return Err(format!("{what} component cannot start with '.'"));
        }
        if component.ends_with(".lock") {
            return Err(format!("{what} component cannot end with '.lock'"));
        }
    }
    Ok(())
}

/// A validated Git branch name.
///
/// # Example
///
/// ```
/// use tether::core::types::BranchName;
///
/// let name = BranchName::new("feature/login").unwrap();
/// assert_eq!(name.as_str(), "feature/login");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new(".hidden").is_err());
/// assert!(BranchName::new("bad..name").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns [`TypeError::InvalidBranchName`] if the name violates Git's
    /// refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        // A leading '-' would be parsed as a flag by git tooling
        if name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '-'".into(),
            ));
        }
        validate_ref_syntax(&name, "branch name").map_err(TypeError::InvalidBranchName)?;
        Ok(Self(name))
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Git object identifier (SHA-1 or SHA-256), normalized to lowercase.
///
/// # Example
///
/// ```
/// use tether::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns [`TypeError::InvalidOid`] if the string is not a 40- or
    /// 64-character hex string.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Get an abbreviated form of the OID (first `len` characters).
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Prefix for branch-to-pull-request association refs.
pub const ASSOCIATION_REF_PREFIX: &str = "refs/pr-association/";

/// A validated Git reference name.
///
/// # Example
///
/// ```
/// use tether::core::types::{BranchName, RefName};
///
/// let branch = BranchName::new("feature/login").unwrap();
/// assert_eq!(
///     RefName::for_branch(&branch).as_str(),
///     "refs/heads/feature/login"
/// );
/// assert_eq!(
///     RefName::for_remote_branch("origin", "main").as_str(),
///     "refs/remotes/origin/main"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Create a new validated ref name.
    ///
    /// # Errors
    ///
    /// Returns [`TypeError::InvalidRefName`] if the name violates Git's
    /// refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        validate_ref_syntax(&name, "ref name").map_err(TypeError::InvalidRefName)?;
        Ok(Self(name))
    }

    /// Create a ref name for a local branch (`refs/heads/<branch>`).
    pub fn for_branch(branch: &BranchName) -> Self {
        // Branch names are validated, so the joined ref is valid too
        Self(format!("refs/heads/{}", branch.as_str()))
    }

    /// Create a remote-tracking ref name (`refs/remotes/<remote>/<branch>`).
    pub fn for_remote_branch(remote: &str, branch: &str) -> Self {
        Self(format!("refs/remotes/{remote}/{branch}"))
    }

    /// Create an association ref name (`refs/pr-association/<branch>`).
    pub fn for_association(branch: &BranchName) -> Self {
        Self(format!("{}{}", ASSOCIATION_REF_PREFIX, branch.as_str()))
    }

    /// Strip a prefix from the ref name and return the remainder.
    pub fn strip_prefix(&self, prefix: &str) -> Option<&str> {
        self.0.strip_prefix(prefix)
    }

    /// Check if this ref is a local branch ref.
    pub fn is_branch_ref(&self) -> bool {
        self.0.starts_with("refs/heads/")
    }

    /// Check if this ref is under the association namespace.
    pub fn is_association_ref(&self) -> bool {
        self.0.starts_with(ASSOCIATION_REF_PREFIX)
    }

    /// Get the ref name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RefName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RefName> for String {
    fn from(name: RefName) -> Self {
        name.0
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
