//! End-to-end tests for the pull request synchronization service.
//!
//! These tests run against real git repositories (an "upstream" repository
//! standing in for the hosted one, local clones, and fork copies) with the
//! mock host supplying pull request metadata.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use tether::core::types::{BranchName, Oid};
use tether::git::Git;
use tether::host::mock::MockHost;
use tether::host::{CreatePrRequest, PrSide, RemotePullRequest, RepoRef};
use tether::service::{AssociationStore, PrAssociation, PullRequestService, SyncError};

// =============================================================================
// Fixtures
// =============================================================================

/// A real git repository in a temp directory.
struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        run_git(dir.path(), &["init", "-b", "main"]);
        configure_user(dir.path());

        std::fs::write(dir.path().join("README.md"), "# Test Repo\n").unwrap();
        run_git(dir.path(), &["add", "README.md"]);
        run_git(dir.path(), &["commit", "-m", "Initial commit"]);

        Self { dir }
    }

    /// Clone an existing repository.
    fn clone_of(source: &Path) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let target = dir.path().join("clone");
        run_git(
            dir.path(),
            &["clone", source.to_str().unwrap(), target.to_str().unwrap()],
        );
        configure_user(&target);
        Self { dir }
    }

    fn path(&self) -> PathBuf {
        // Clones live in a "clone" subdirectory
        let clone = self.dir.path().join("clone");
        if clone.exists() {
            clone
        } else {
            self.dir.path().to_path_buf()
        }
    }

    fn url(&self) -> String {
        self.path().to_str().unwrap().to_string()
    }

    fn git(&self) -> Git {
        Git::open(&self.path()).expect("failed to open test repo")
    }

    fn head(&self) -> Oid {
        self.git().head_oid().unwrap()
    }

    fn commit_file(&self, path: &str, content: &str, message: &str) -> Oid {
        std::fs::write(self.path().join(path), content).unwrap();
        run_git(&self.path(), &["add", path]);
        run_git(&self.path(), &["commit", "-m", message]);
        self.head()
    }

    fn checkout(&self, name: &str) {
        run_git(&self.path(), &["checkout", name]);
    }

    fn create_branch(&self, name: &str) {
        run_git(&self.path(), &["branch", name]);
    }
}

fn configure_user(dir: &Path) {
    run_git(dir, &["config", "user.email", "test@example.com"]);
    run_git(dir, &["config", "user.name", "Test User"]);
}

fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");
    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

/// Upstream repository with a pull request branch, a local clone, and a
/// mock host serving PR #42 ("Fix login bug", fix-login -> main).
struct Scenario {
    upstream: TestRepo,
    local: TestRepo,
    base_sha: Oid,
    head_sha: Oid,
    host: MockHost,
}

impl Scenario {
    fn new() -> Self {
        let upstream = TestRepo::new();
        let base_sha = upstream.head();

        upstream.create_branch("fix-login");
        upstream.checkout("fix-login");
        let head_sha = upstream.commit_file("login.rs", "fn login() {}\n", "Fix login bug");
        upstream.checkout("main");

        let local = TestRepo::clone_of(&upstream.path());

        let host = MockHost::new();
        let scenario = Self {
            upstream,
            local,
            base_sha,
            head_sha,
            host: host.clone(),
        };
        host.update_pull_request(scenario.pr());
        scenario
    }

    fn service(&self) -> PullRequestService<MockHost> {
        PullRequestService::new(self.host.clone())
    }

    fn upstream_ref(&self) -> RepoRef {
        RepoRef {
            owner: "octocat".to_string(),
            name: "hello-world".to_string(),
            clone_url: self.upstream.url(),
        }
    }

    /// The PR #42 snapshot matching the current fixture state.
    fn pr(&self) -> RemotePullRequest {
        RemotePullRequest {
            number: 42,
            title: "Fix login bug".to_string(),
            body: None,
            head: PrSide {
                branch: "fix-login".to_string(),
                sha: self.head_sha.to_string(),
                repo: Some(self.upstream_ref()),
            },
            base: PrSide {
                branch: "main".to_string(),
                sha: self.base_sha.to_string(),
                repo: Some(self.upstream_ref()),
            },
        }
    }

    fn local_path(&self) -> PathBuf {
        self.local.path()
    }
}

fn branch(name: &str) -> BranchName {
    BranchName::new(name).unwrap()
}

// =============================================================================
// Reference Scenario: fetch, checkout, list
// =============================================================================

#[tokio::test]
async fn fetch_and_checkout_reference_scenario() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    // Derived name is deterministic
    let name = service
        .default_local_branch_name(&repo, 42, "Fix login bug")
        .await
        .unwrap();
    assert_eq!(name, "pr/42-fix-login-bug");

    service.fetch_and_checkout(&repo, 42, &name).await.unwrap();

    let git = scenario.local.git();
    assert_eq!(git.current_branch().unwrap(), Some(branch(&name)));
    assert_eq!(git.head_oid().unwrap(), scenario.head_sha);
    assert!(scenario.local.path().join("login.rs").exists());

    // Post-checkout state is clean
    assert!(service.is_clean_for_checkout(&repo).await.unwrap());

    // The branch is now listed for the pull request
    let branches: Vec<_> = service
        .local_branches(&repo, &scenario.pr())
        .await
        .unwrap()
        .collect();
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0].name.as_str(), name);
}

#[tokio::test]
async fn derived_name_avoids_unrelated_branch_collision() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    // A colliding branch not associated with the PR
    scenario.local.create_branch("pr/42-fix-login-bug");

    let name = service
        .default_local_branch_name(&repo, 42, "Fix login bug")
        .await
        .unwrap();
    assert_eq!(name, "pr/42-fix-login-bug-2");
}

#[tokio::test]
async fn derived_name_reuses_associated_branch_name() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    service
        .fetch_and_checkout(&repo, 42, "pr/42-fix-login-bug")
        .await
        .unwrap();

    // The branch exists but is associated with this PR, so no suffix
    let name = service
        .default_local_branch_name(&repo, 42, "Fix login bug")
        .await
        .unwrap();
    assert_eq!(name, "pr/42-fix-login-bug");
}

#[tokio::test]
async fn refetch_fast_forwards_existing_branch() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    service
        .fetch_and_checkout(&repo, 42, "pr/42-fix-login-bug")
        .await
        .unwrap();

    // The PR head advances upstream
    scenario.upstream.checkout("fix-login");
    let new_head = scenario
        .upstream
        .commit_file("login.rs", "fn login() { /* v2 */ }\n", "Address review");
    scenario.upstream.checkout("main");

    let mut pr = scenario.pr();
    pr.head.sha = new_head.to_string();
    scenario.host.update_pull_request(pr);

    service
        .fetch_and_checkout(&repo, 42, "pr/42-fix-login-bug")
        .await
        .unwrap();
    assert_eq!(scenario.local.git().head_oid().unwrap(), new_head);
}

#[tokio::test]
async fn fetch_and_checkout_unknown_pr_fails() {
    let scenario = Scenario::new();
    let service = scenario.service();

    let result = service
        .fetch_and_checkout(&scenario.local_path(), 999, "pr/999")
        .await;
    assert!(matches!(result, Err(SyncError::PullRequestNotFound(999))));
}

// =============================================================================
// Dirty Working Tree
// =============================================================================

#[tokio::test]
async fn dirty_worktree_blocks_checkout_and_leaves_head_untouched() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    // Uncommitted modification to a tracked file
    std::fs::write(repo.join("README.md"), "work in progress\n").unwrap();
    assert!(!service.is_clean_for_checkout(&repo).await.unwrap());

    let result = service
        .fetch_and_checkout(&repo, 42, "pr/42-fix-login-bug")
        .await;
    assert!(matches!(result, Err(SyncError::DirtyWorkingTree(_))));

    let git = scenario.local.git();
    // HEAD and index untouched
    assert_eq!(git.current_branch().unwrap(), Some(branch("main")));
    assert_eq!(
        std::fs::read_to_string(repo.join("README.md")).unwrap(),
        "work in progress\n"
    );
    // The fetch stage completed: the branch ref exists, so the caller can
    // retry the checkout without re-fetching
    assert_eq!(
        git.branch_tip(&branch("pr/42-fix-login-bug")).unwrap(),
        Some(scenario.head_sha.clone())
    );
}

#[tokio::test]
async fn fetch_failure_is_reported_as_fetch_stage() {
    let scenario = Scenario::new();
    let service = scenario.service();

    // PR whose source repository is unreachable
    let mut pr = scenario.pr();
    pr.number = 50;
    pr.head.repo = Some(RepoRef {
        owner: "ghost".to_string(),
        name: "vanished".to_string(),
        clone_url: "/nonexistent/path/to/repo".to_string(),
    });
    scenario.host.update_pull_request(pr);

    let result = service
        .fetch_and_checkout(&scenario.local_path(), 50, "pr/50-gone")
        .await;
    assert!(matches!(result, Err(SyncError::Fetch(_))));

    // Nothing was created locally
    let git = scenario.local.git();
    assert!(git.branch_tip(&branch("pr/50-gone")).unwrap().is_none());
}

// =============================================================================
// Switch To Branch
// =============================================================================

#[tokio::test]
async fn switch_to_branch_uses_existing_local_branch() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    service
        .fetch_and_checkout(&repo, 42, "pr/42-fix-login-bug")
        .await
        .unwrap();
    scenario.local.checkout("main");

    service
        .switch_to_branch(&repo, &scenario.pr())
        .await
        .unwrap();
    assert_eq!(
        scenario.local.git().current_branch().unwrap(),
        Some(branch("pr/42-fix-login-bug"))
    );
}

#[tokio::test]
async fn switch_to_branch_without_local_branch_fails() {
    let scenario = Scenario::new();
    let service = scenario.service();

    let result = service
        .switch_to_branch(&scenario.local_path(), &scenario.pr())
        .await;
    assert!(matches!(result, Err(SyncError::NoLocalBranch(42))));
}

#[tokio::test]
async fn switch_prefers_most_recently_used_branch() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    service
        .fetch_and_checkout(&repo, 42, "pr/42-fix-login-bug")
        .await
        .unwrap();
    scenario.local.checkout("main");

    // A second local copy of the same PR, associated later
    let git = scenario.local.git();
    git.create_or_fast_forward_branch(&branch("pr/42-copy"), &scenario.head_sha)
        .unwrap();
    let store = AssociationStore::new(&git);
    store
        .write(
            &branch("pr/42-copy"),
            &PrAssociation::new(42, "origin", "octocat", "hello-world"),
        )
        .unwrap();

    let branches: Vec<_> = service
        .local_branches(&repo, &scenario.pr())
        .await
        .unwrap()
        .collect();
    assert_eq!(branches.len(), 2);
    assert_eq!(branches[0].name.as_str(), "pr/42-copy");

    service
        .switch_to_branch(&repo, &scenario.pr())
        .await
        .unwrap();
    assert_eq!(
        scenario.local.git().current_branch().unwrap(),
        Some(branch("pr/42-copy"))
    );
}

#[tokio::test]
async fn tracking_branch_found_without_association() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    // A branch tracking the PR head created outside this service
    run_git(
        &repo,
        &["fetch", "origin", "+refs/heads/fix-login:refs/remotes/origin/fix-login"],
    );
    run_git(
        &repo,
        &["branch", "--track", "my-review", "origin/fix-login"],
    );

    let branches: Vec<_> = service
        .local_branches(&repo, &scenario.pr())
        .await
        .unwrap()
        .collect();
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0].name.as_str(), "my-review");
}

// =============================================================================
// Pull
// =============================================================================

#[tokio::test]
async fn pull_fast_forwards_current_branch() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    let new_tip = scenario
        .upstream
        .commit_file("CHANGES.md", "update\n", "Upstream change");

    service.pull(&repo).await.unwrap();
    assert_eq!(scenario.local.git().head_oid().unwrap(), new_tip);
    assert!(scenario.local.path().join("CHANGES.md").exists());
}

#[tokio::test]
async fn pull_without_upstream_fails() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    // A branch tracking nothing
    run_git(&repo, &["checkout", "-b", "standalone"]);

    let result = service.pull(&repo).await;
    assert!(matches!(result, Err(SyncError::NoUpstream)));
}

#[tokio::test]
async fn pull_with_diverged_histories_fails() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    scenario
        .upstream
        .commit_file("upstream.txt", "u\n", "Upstream commit");
    scenario
        .local
        .commit_file("local.txt", "l\n", "Local commit");

    let result = service.pull(&repo).await;
    assert!(matches!(result, Err(SyncError::NonFastForward(_))));
    // The local commit is untouched
    assert!(scenario.local.path().join("local.txt").exists());
}

#[tokio::test]
async fn pull_when_up_to_date_is_a_no_op() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let before = scenario.local.head();

    service.pull(&scenario.local_path()).await.unwrap();
    assert_eq!(scenario.local.head(), before);
}

// =============================================================================
// Unmark
// =============================================================================

#[tokio::test]
async fn unmark_is_idempotent() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    service
        .fetch_and_checkout(&repo, 42, "pr/42-fix-login-bug")
        .await
        .unwrap();

    let git = scenario.local.git();
    let store = AssociationStore::new(&git);
    assert!(store.read(&branch("pr/42-fix-login-bug")).unwrap().is_some());

    service.unmark_local_branch(&repo).await.unwrap();
    assert!(store.read(&branch("pr/42-fix-login-bug")).unwrap().is_none());

    // Second unmark: same final state, no error
    service.unmark_local_branch(&repo).await.unwrap();
    assert!(store.read(&branch("pr/42-fix-login-bug")).unwrap().is_none());

    // And the branch no longer lists for the PR
    let branches: Vec<_> = service
        .local_branches(&repo, &scenario.pr())
        .await
        .unwrap()
        .collect();
    assert!(branches.is_empty());
}

// =============================================================================
// Fork Detection and Fork Fetch
// =============================================================================

#[tokio::test]
async fn same_repo_pr_is_not_from_fork() {
    let scenario = Scenario::new();
    let service = scenario.service();

    assert!(!service
        .is_from_fork(&scenario.local_path(), &scenario.pr())
        .unwrap());
}

#[tokio::test]
async fn fork_pr_is_detected_and_fetched_via_new_remote() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    // A fork with its own PR branch
    let fork = TestRepo::clone_of(&scenario.upstream.path());
    run_git(&fork.path(), &["checkout", "-b", "fork-feature"]);
    let fork_head = fork.commit_file("fork.rs", "// fork\n", "Fork change");

    let mut pr = scenario.pr();
    pr.number = 7;
    pr.title = "Fork change".to_string();
    pr.head = PrSide {
        branch: "fork-feature".to_string(),
        sha: fork_head.to_string(),
        repo: Some(RepoRef {
            owner: "contributor".to_string(),
            name: "hello-world".to_string(),
            clone_url: fork.url(),
        }),
    };
    scenario.host.update_pull_request(pr.clone());

    assert!(service.is_from_fork(&repo, &pr).unwrap());

    service
        .fetch_and_checkout(&repo, 7, "pr/7-fork-change")
        .await
        .unwrap();

    let git = scenario.local.git();
    assert_eq!(
        git.current_branch().unwrap(),
        Some(branch("pr/7-fork-change"))
    );
    assert_eq!(git.head_oid().unwrap(), fork_head);
    // A deterministic remote was added for the fork
    assert_eq!(
        git.remote_url("fork-contributor").unwrap().as_deref(),
        Some(fork.url().as_str())
    );

    // Fetching again reuses the remote instead of duplicating it
    scenario.local.checkout("main");
    service
        .fetch_and_checkout(&repo, 7, "pr/7-fork-change")
        .await
        .unwrap();
    let fork_remotes = git
        .remotes()
        .unwrap()
        .into_iter()
        .filter(|r| r.name.starts_with("fork-"))
        .count();
    assert_eq!(fork_remotes, 1);
}

// =============================================================================
// Divergence
// =============================================================================

#[tokio::test]
async fn divergence_of_identical_refs_is_zero() {
    let scenario = Scenario::new();
    let service = scenario.service();

    // Local main == origin/main == PR base
    let divergence = service
        .calculate_history_divergence(&scenario.local_path(), 42)
        .await
        .unwrap();

    assert_eq!(divergence.ahead, 0);
    assert_eq!(divergence.behind, 0);
    assert_eq!(divergence.merge_base, Some(scenario.base_sha.clone()));
}

#[tokio::test]
async fn divergence_counts_ahead_and_behind() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    scenario.upstream.commit_file("u1.md", "1\n", "Upstream 1");
    scenario.upstream.commit_file("u2.md", "2\n", "Upstream 2");
    run_git(&repo, &["fetch", "origin"]);

    scenario.local.commit_file("l1.md", "1\n", "Local 1");

    let divergence = service
        .calculate_history_divergence(&repo, 42)
        .await
        .unwrap();
    assert_eq!(divergence.ahead, 1);
    assert_eq!(divergence.behind, 2);
    assert_eq!(divergence.merge_base, Some(scenario.base_sha.clone()));
}

#[tokio::test]
async fn divergence_recomputes_after_base_force_push() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    // Base branch grows two commits, then history is rewritten to one
    scenario.upstream.commit_file("u1.md", "1\n", "Upstream 1");
    scenario.upstream.commit_file("u2.md", "2\n", "Upstream 2");
    run_git(&repo, &["fetch", "origin"]);

    let before = service
        .calculate_history_divergence(&repo, 42)
        .await
        .unwrap();
    assert_eq!(before.behind, 2);

    run_git(
        &scenario.upstream.path(),
        &["reset", "--hard", scenario.base_sha.as_str()],
    );
    scenario
        .upstream
        .commit_file("rewritten.md", "r\n", "Rewritten history");
    run_git(&repo, &["fetch", "origin"]);

    // Recomputation reflects the new base ancestry, not the stale one
    let after = service
        .calculate_history_divergence(&repo, 42)
        .await
        .unwrap();
    assert_eq!(after.behind, 1);
    assert_eq!(after.ahead, 0);
    assert_eq!(after.merge_base, Some(scenario.base_sha.clone()));
}

// =============================================================================
// File Extraction
// =============================================================================

#[tokio::test]
async fn extract_file_is_idempotent() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    let first = service
        .extract_file(&repo, scenario.base_sha.as_str(), "README.md")
        .await
        .unwrap();
    let second = service
        .extract_file(&repo, scenario.base_sha.as_str(), "README.md")
        .await
        .unwrap();

    assert_eq!(first, second);
    let content_a = std::fs::read(&first).unwrap();
    let content_b = std::fs::read(&second).unwrap();
    assert_eq!(content_a, content_b);
    assert_eq!(content_a, b"# Test Repo\n");
}

#[tokio::test]
async fn extract_file_missing_path_is_distinct_error() {
    let scenario = Scenario::new();
    let service = scenario.service();

    let result = service
        .extract_file(
            &scenario.local_path(),
            scenario.base_sha.as_str(),
            "no-such-file.rs",
        )
        .await;
    assert!(matches!(
        result,
        Err(SyncError::FileNotFoundAtRevision { .. })
    ));
}

#[tokio::test]
async fn extract_file_missing_commit_is_distinct_error() {
    let scenario = Scenario::new();
    let service = scenario.service();

    let result = service
        .extract_file(
            &scenario.local_path(),
            "1111111111111111111111111111111111111111",
            "README.md",
        )
        .await;
    assert!(matches!(result, Err(SyncError::RevisionNotFound(_))));
}

#[tokio::test]
async fn diff_files_for_added_file_have_empty_left() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    // login.rs exists only in the PR head
    let (left, right) = service
        .extract_diff_files(&repo, &scenario.pr(), "login.rs")
        .await
        .unwrap();

    assert_eq!(std::fs::read(&left).unwrap(), b"");
    assert_eq!(std::fs::read(&right).unwrap(), b"fn login() {}\n");
}

#[tokio::test]
async fn diff_files_for_deleted_file_have_empty_right() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    // A PR that deletes README.md
    scenario.upstream.checkout("fix-login");
    run_git(&scenario.upstream.path(), &["rm", "README.md"]);
    run_git(&scenario.upstream.path(), &["commit", "-m", "Drop readme"]);
    let new_head = scenario.upstream.head();
    scenario.upstream.checkout("main");

    let mut pr = scenario.pr();
    pr.head.sha = new_head.to_string();
    scenario.host.update_pull_request(pr.clone());

    // Same-repo PRs are fetched by the caller; only fork content is
    // fetched on demand
    run_git(&repo, &["fetch", "origin"]);

    let (left, right) = service
        .extract_diff_files(&repo, &pr, "README.md")
        .await
        .unwrap();

    assert_eq!(std::fs::read(&left).unwrap(), b"# Test Repo\n");
    assert_eq!(std::fs::read(&right).unwrap(), b"");
}

#[tokio::test]
async fn diff_files_fetch_fork_content_on_demand() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    let fork = TestRepo::clone_of(&scenario.upstream.path());
    run_git(&fork.path(), &["checkout", "-b", "fork-docs"]);
    let fork_head = fork.commit_file("DOCS.md", "docs from fork\n", "Add docs");

    let mut pr = scenario.pr();
    pr.number = 9;
    pr.head = PrSide {
        branch: "fork-docs".to_string(),
        sha: fork_head.to_string(),
        repo: Some(RepoRef {
            owner: "contributor".to_string(),
            name: "hello-world".to_string(),
            clone_url: fork.url(),
        }),
    };
    scenario.host.update_pull_request(pr.clone());

    // The head commit is not local until extract_diff_files fetches it
    assert!(!scenario.local.git().commit_exists(&fork_head));

    let (left, right) = service
        .extract_diff_files(&repo, &pr, "DOCS.md")
        .await
        .unwrap();
    assert_eq!(std::fs::read(&left).unwrap(), b"");
    assert_eq!(std::fs::read(&right).unwrap(), b"docs from fork\n");
}

// =============================================================================
// Pull Request Template
// =============================================================================

#[tokio::test]
async fn template_absent_is_none() {
    let scenario = Scenario::new();
    let service = scenario.service();

    let template = service
        .pull_request_template(&scenario.local_path())
        .await
        .unwrap();
    assert!(template.is_none());
}

#[tokio::test]
async fn template_found_in_github_dir() {
    let scenario = Scenario::new();
    let service = scenario.service();
    let repo = scenario.local_path();

    std::fs::create_dir_all(repo.join(".github")).unwrap();
    std::fs::write(
        repo.join(".github/PULL_REQUEST_TEMPLATE.md"),
        "## Checklist\n",
    )
    .unwrap();

    let template = service.pull_request_template(&repo).await.unwrap();
    assert_eq!(template.as_deref(), Some("## Checklist\n"));
}

// =============================================================================
// Pull Request Creation
// =============================================================================

#[tokio::test]
async fn create_pull_request_delegates_to_host() {
    let scenario = Scenario::new();
    let service = scenario.service();

    let pr = service
        .create_pull_request(
            &scenario.local_path(),
            CreatePrRequest {
                head: "fix-login".to_string(),
                base: "main".to_string(),
                title: "Fix login bug".to_string(),
                body: Some("Fixes the login flow".to_string()),
                draft: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(pr.number, 43); // PR 42 already exists on the mock host
    assert_eq!(pr.title, "Fix login bug");
}

// =============================================================================
// Association Store
// =============================================================================

#[tokio::test]
async fn association_store_roundtrip_on_real_repo() {
    let scenario = Scenario::new();
    let git = scenario.local.git();
    let store = AssociationStore::new(&git);
    let name = branch("pr/42-fix-login-bug");

    assert!(store.read(&name).unwrap().is_none());

    let assoc = PrAssociation::new(42, "origin", "octocat", "hello-world");
    store.write(&name, &assoc).unwrap();

    let entry = store.read(&name).unwrap().unwrap();
    assert_eq!(entry.association.number, 42);
    assert_eq!(entry.association.remote, "origin");

    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].0, name);

    assert!(store.delete(&name).unwrap());
    assert!(!store.delete(&name).unwrap());
    assert!(store.read(&name).unwrap().is_none());
}

#[tokio::test]
async fn association_rewrite_updates_timestamp() {
    let scenario = Scenario::new();
    let git = scenario.local.git();
    let store = AssociationStore::new(&git);
    let name = branch("pr/42-fix-login-bug");

    store
        .write(&name, &PrAssociation::new(42, "origin", "a", "b"))
        .unwrap();
    let first = store.read(&name).unwrap().unwrap().association.updated_at;

    std::thread::sleep(std::time::Duration::from_millis(10));
    store
        .write(&name, &PrAssociation::new(42, "origin", "a", "b"))
        .unwrap();
    let second = store.read(&name).unwrap().unwrap().association.updated_at;

    assert!(second > first);
}
