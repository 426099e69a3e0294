//! core::naming
//!
//! Local branch naming for remote pull requests.
//!
//! A pull request title is slugified into a branch-safe suffix and joined
//! with the PR number under a configurable prefix. Collisions with existing
//! branches are resolved with numeric disambiguators, except that branches
//! already associated with the same pull request are not collisions.

use crate::core::types::{BranchName, TypeError};

/// Generate a branch-safe slug from a pull request title.
///
/// Uses the first line of the title: lowercases ASCII alphanumerics, maps
/// whitespace and underscores to hyphens, drops everything else, collapses
/// runs of hyphens, and truncates to `max_len` characters.
///
/// # Example
///
/// ```
/// use tether::core::naming::slugify;
///
/// assert_eq!(slugify("Fix login bug", 40), "fix-login-bug");
/// assert_eq!(slugify("Fix bug #123 [WIP]", 40), "fix-bug-123-wip");
/// ```
pub fn slugify(title: &str, max_len: usize) -> String {
    let first_line = title.lines().next().unwrap_or("");

    let slug: String = first_line
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() {
                Some(c.to_ascii_lowercase())
            } else if c.is_whitespace() || c == '_' || c == '-' {
                Some('-')
            } else {
                None
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    let truncated: String = slug.chars().take(max_len).collect();
    // A truncation can leave a dangling hyphen
    truncated.trim_end_matches('-').to_string()
}

/// Compute the default local branch name for a pull request.
///
/// The base name is `<prefix><number>-<slug>` (or `<prefix><number>` when the
/// title slugifies to nothing). If the base name collides with a branch in
/// `existing` that is not listed in `associated`, numeric suffixes `-2`,
/// `-3`, ... are appended until the name is free.
///
/// Deterministic given identical inputs and identical existing-branch state.
///
/// # Example
///
/// ```
/// use tether::core::naming::default_local_branch_name;
///
/// let name = default_local_branch_name("pr/", 42, "Fix login bug", 40, &[], &[]).unwrap();
/// assert_eq!(name.as_str(), "pr/42-fix-login-bug");
/// ```
pub fn default_local_branch_name(
    prefix: &str,
    number: u64,
    title: &str,
    max_slug_len: usize,
    existing: &[BranchName],
    associated: &[BranchName],
) -> Result<BranchName, TypeError> {
    let slug = slugify(title, max_slug_len);
    let base = if slug.is_empty() {
        format!("{prefix}{number}")
    } else {
        format!("{prefix}{number}-{slug}")
    };

    let collides = |name: &str| {
        existing
            .iter()
            .any(|b| b.as_str() == name && !associated.iter().any(|a| a == b))
    };

    if !collides(&base) {
        return BranchName::new(base);
    }

    let mut counter = 2u64;
    loop {
        let candidate = format!("{base}-{counter}");
        if !collides(&candidate) {
            return BranchName::new(candidate);
        }
        counter += 1;
    }
}
