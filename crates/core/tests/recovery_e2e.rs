//! End-to-end tests for overwrite-conflict detection and recovery.
//!
//! These tests exercise the real pipeline with:
//! - Local git repositories created in temp directories
//! - The `git` executable driven through `GitRunner`
//! - `WorkTree` status lookups, `FsDeleter`, and `GitResetter`
//!
//! Tests skip gracefully if `git` is not installed.

use std::path::Path;
use std::process::{Command, Stdio};

use tempfile::TempDir;

use gitrecover_core::git::{GitResetter, WorkTree};
use gitrecover_core::process::GitRunner;
use gitrecover_core::recovery::{
    FixedChoice, FsDeleter, RecoveryOutcome, RecoverySession, UserChoice,
};

// ===========================================================================
// Helpers
// ===========================================================================

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .env("LC_ALL", "C")
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

fn read(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(name)).unwrap()
}

/// A repository whose current branch conflicts with branch `feature`:
/// `a.txt` has an uncommitted edit and `new.txt` exists untracked, while
/// `feature` changes `a.txt` and adds `new.txt`.
fn conflicting_repo() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path();

    git(p, &["init", "-q"]);
    git(p, &["config", "advice.detachedHead", "false"]);
    write(p, "a.txt", "base\n");
    git(p, &["add", "a.txt"]);
    git(p, &["commit", "-q", "-m", "base"]);

    git(p, &["checkout", "-q", "-b", "feature"]);
    write(p, "a.txt", "feature\n");
    write(p, "new.txt", "from feature\n");
    git(p, &["add", "a.txt", "new.txt"]);
    git(p, &["commit", "-q", "-m", "feature work"]);
    git(p, &["checkout", "-q", "-"]);

    write(p, "a.txt", "local edit\n");
    write(p, "new.txt", "local scratch\n");
    dir
}

fn merge_args() -> Vec<String> {
    vec!["merge".into(), "--no-edit".into(), "feature".into()]
}

async fn run_attempt(session: &mut RecoverySession, runner: &GitRunner) -> bool {
    session.start_attempt().unwrap();
    let exit = runner
        .run(&merge_args(), None, |line| session.feed_output(&line))
        .await
        .unwrap();
    session.finish_attempt(&exit)
}

fn sorted(paths: &[String]) -> Vec<String> {
    let mut v = paths.to_vec();
    v.sort();
    v
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test]
async fn test_reset_and_delete_then_retry_succeeds() {
    if !git_available() {
        eprintln!("SKIPPED: git not installed");
        return;
    }
    let dir = conflicting_repo();
    let p = dir.path();
    let runner = GitRunner::new("git", p);
    let mut session = RecoverySession::new();

    assert!(run_attempt(&mut session, &runner).await, "conflict should be offered");
    assert_eq!(sorted(session.collected_paths()), ["a.txt", "new.txt"]);

    let worktree = WorkTree::open(p).unwrap();
    let outcome = session
        .recover(
            &worktree,
            &FixedChoice(UserChoice::ResetAndDelete),
            &FsDeleter::new(worktree.workdir()),
            &GitResetter::new("git", p),
        )
        .unwrap();

    let RecoveryOutcome::Retry(report) = outcome else {
        panic!("expected a retry, got {:?}", outcome);
    };
    assert_eq!(report.plan.reset_targets, ["a.txt"]);
    assert_eq!(report.plan.delete_candidates, ["new.txt"]);
    assert_eq!(report.result.deleted, ["new.txt"]);
    assert_eq!(read(p, "a.txt"), "base\n");
    assert!(!p.join("new.txt").exists());

    assert!(!run_attempt(&mut session, &runner).await, "retry should merge cleanly");
    assert_eq!(read(p, "a.txt"), "feature\n");
    assert_eq!(read(p, "new.txt"), "from feature\n");

    let head = worktree.head_commit().unwrap();
    assert_eq!(head.subject(), "feature work");
}

#[tokio::test]
async fn test_reset_only_keeps_untracked_file() {
    if !git_available() {
        eprintln!("SKIPPED: git not installed");
        return;
    }
    let dir = conflicting_repo();
    let p = dir.path();
    let runner = GitRunner::new("git", p);
    let mut session = RecoverySession::new();

    assert!(run_attempt(&mut session, &runner).await);

    let worktree = WorkTree::open(p).unwrap();
    let outcome = session
        .recover(
            &worktree,
            &FixedChoice(UserChoice::ResetOnly),
            &FsDeleter::new(worktree.workdir()),
            &GitResetter::new("git", p),
        )
        .unwrap();
    assert!(matches!(outcome, RecoveryOutcome::Retry(_)));
    assert_eq!(read(p, "a.txt"), "base\n");
    assert_eq!(read(p, "new.txt"), "local scratch\n");

    // The untracked file still blocks the merge, so recovery is offered again.
    assert!(run_attempt(&mut session, &runner).await);
    assert_eq!(session.collected_paths(), ["new.txt"]);
}

#[tokio::test]
async fn test_cancel_leaves_tree_untouched() {
    if !git_available() {
        eprintln!("SKIPPED: git not installed");
        return;
    }
    let dir = conflicting_repo();
    let p = dir.path();
    let runner = GitRunner::new("git", p);
    let mut session = RecoverySession::new();

    assert!(run_attempt(&mut session, &runner).await);

    let worktree = WorkTree::open(p).unwrap();
    let outcome = session
        .recover(
            &worktree,
            &FixedChoice(UserChoice::Cancel),
            &FsDeleter::new(worktree.workdir()),
            &GitResetter::new("git", p),
        )
        .unwrap();
    assert_eq!(outcome, RecoveryOutcome::Cancelled);
    assert!(session.is_offered());
    assert_eq!(read(p, "a.txt"), "local edit\n");
    assert_eq!(read(p, "new.txt"), "local scratch\n");
}

#[tokio::test]
async fn test_clean_merge_is_not_offered() {
    if !git_available() {
        eprintln!("SKIPPED: git not installed");
        return;
    }
    let dir = conflicting_repo();
    let p = dir.path();
    git(p, &["checkout", "-q", "--", "a.txt"]);
    std::fs::remove_file(p.join("new.txt")).unwrap();

    let runner = GitRunner::new("git", p);
    let mut session = RecoverySession::new();
    assert!(!run_attempt(&mut session, &runner).await);
    assert!(session.collected_paths().is_empty());
}
