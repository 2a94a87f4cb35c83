//! Local version-control operations, via the git binary.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::runner;

/// A local git working tree
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    /// Open an existing working tree
    pub fn open(root: &Path) -> Result<Self> {
        let inside = runner::run_capture_in(root, "git", &["rev-parse", "--is-inside-work-tree"])
            .with_context(|| format!("{} is not a git repository", root.display()))?;
        if inside.trim() != "true" {
            anyhow::bail!("{} is not a git working tree", root.display());
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the working tree has uncommitted changes (staged or not)
    pub fn has_changes(&self) -> Result<bool> {
        let status = runner::run_capture_in(&self.root, "git", &["status", "--porcelain"])?;
        Ok(!status.trim().is_empty())
    }

    /// Stage everything
    pub fn stage_all(&self) -> Result<()> {
        runner::run_capture_in(&self.root, "git", &["add", "-A"])?;
        Ok(())
    }

    /// Commit staged changes with the given message
    pub fn commit(&self, message: &str) -> Result<()> {
        runner::run_capture_in(&self.root, "git", &["commit", "-m", message])
            .context("git commit failed")?;
        Ok(())
    }

    /// Stage and commit pending changes. Returns false (and commits nothing)
    /// when the tree is clean.
    pub fn commit_if_dirty(&self, message: &str) -> Result<bool> {
        if !self.has_changes()? {
            log::info!("Working tree clean, nothing to commit");
            return Ok(false);
        }
        self.stage_all()?;
        self.commit(message)?;
        Ok(true)
    }

    /// Whether an `origin` remote is configured
    pub fn has_origin(&self) -> bool {
        runner::run_capture_in(&self.root, "git", &["remote", "get-url", "origin"]).is_ok()
    }

    /// Push the current branch to origin. Fails loudly when no remote is
    /// configured, with a remediation hint.
    pub fn push(&self) -> Result<()> {
        if !self.has_origin() {
            anyhow::bail!(
                "No 'origin' remote configured.\n\
                 Add one first: git remote add origin <url>"
            );
        }
        runner::run_capture_in(&self.root, "git", &["push"])
            .context("git push failed: check remote access and branch tracking")?;
        Ok(())
    }

    /// Short hash of HEAD
    pub fn head_short(&self) -> Result<String> {
        runner::run_capture_in(&self.root, "git", &["rev-parse", "--short", "HEAD"])
    }

    /// Subject line of the HEAD commit
    pub fn head_subject(&self) -> Result<String> {
        runner::run_capture_in(&self.root, "git", &["log", "-1", "--pretty=%s"])
    }

    /// Number of commits on the current branch
    pub fn commit_count(&self) -> Result<usize> {
        let count = runner::run_capture_in(&self.root, "git", &["rev-list", "--count", "HEAD"])?;
        count
            .trim()
            .parse()
            .context("Unexpected output from git rev-list")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn init_repo(dir: &Path) -> GitRepo {
        runner::run_capture_in(dir, "git", &["init", "-q"]).unwrap();
        runner::run_capture_in(dir, "git", &["config", "user.email", "dev@example.com"]).unwrap();
        runner::run_capture_in(dir, "git", &["config", "user.name", "Dev"]).unwrap();
        fs::write(dir.join("app.py"), "print('hi')").unwrap();
        let repo = GitRepo::open(dir).unwrap();
        repo.stage_all().unwrap();
        repo.commit("initial").unwrap();
        repo
    }

    #[test]
    fn dirty_tree_commits_exactly_once_with_message() {
        if !runner::command_exists("git") {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());

        fs::write(dir.path().join("app.py"), "print('changed')").unwrap();
        assert!(repo.commit_if_dirty("fix login flow").unwrap());

        assert_eq!(repo.commit_count().unwrap(), 2);
        assert_eq!(repo.head_subject().unwrap().trim(), "fix login flow");
        assert!(!repo.has_changes().unwrap());
    }

    #[test]
    fn clean_tree_commits_nothing() {
        if !runner::command_exists("git") {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());

        assert!(!repo.commit_if_dirty("should not appear").unwrap());
        assert_eq!(repo.commit_count().unwrap(), 1);
        assert_eq!(repo.head_subject().unwrap().trim(), "initial");
    }

    #[test]
    fn push_without_origin_fails_with_hint() {
        if !runner::command_exists("git") {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());

        let err = repo.push().unwrap_err();
        assert!(err.to_string().contains("git remote add origin"));
    }

    #[test]
    fn open_rejects_non_repo_directories() {
        if !runner::command_exists("git") {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        assert!(GitRepo::open(dir.path()).is_err());
    }
}
