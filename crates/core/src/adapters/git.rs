use std::fs;
use std::path::{Path, PathBuf};

use git2::{BranchType, WorktreeAddOptions, WorktreePruneOptions};
use thiserror::Error;

use crate::adapters::fs as fsutil;

/// Compute the branch name for a workspace token: `centy/{token}`.
pub fn workspace_branch_name(token: &str) -> String {
  format!("centy/{token}")
}

/// Compute the worktree path under `.centy/worktrees/{token}`.
pub fn workspace_worktree_path(repo_root: &Path, token: &str) -> PathBuf {
  fsutil::worktrees_dir(repo_root).join(token)
}

/// Errors from source control operations, split by whether a retry is
/// worthwhile. Lock contention and half-finished filesystem state are
/// transient; a missing repository or an invalid ref is not.
#[derive(Debug, Error)]
pub enum ScmError {
  #[error("{0}")]
  Transient(String),
  #[error("{0}")]
  Failed(String),
}

impl ScmError {
  pub fn is_transient(&self) -> bool {
    matches!(self, ScmError::Transient(_))
  }
}

fn classify(e: git2::Error) -> ScmError {
  if e.code() == git2::ErrorCode::Locked {
    ScmError::Transient(e.message().to_string())
  } else {
    ScmError::Failed(e.message().to_string())
  }
}

/// Source control operations the workspace manager needs. The production
/// implementation shells into libgit2; tests substitute fakes to exercise
/// failure paths without a repository.
pub trait SourceControl: Send + Sync {
  /// Create a worktree at `path` on `branch`, creating the branch from the
  /// current HEAD if it does not exist yet.
  fn create_worktree(&self, repo_root: &Path, path: &Path, branch: &str) -> Result<(), ScmError>;

  /// Remove the worktree at `path`, prune its administrative state and
  /// delete `branch`.
  fn remove_worktree(&self, repo_root: &Path, path: &Path, branch: &str) -> Result<(), ScmError>;
}

pub struct Git2SourceControl;

impl SourceControl for Git2SourceControl {
  fn create_worktree(&self, repo_root: &Path, path: &Path, branch: &str) -> Result<(), ScmError> {
    let repo = git2::Repository::open(repo_root).map_err(classify)?;
    let head = repo
      .head()
      .and_then(|h| h.peel_to_commit())
      .map_err(classify)?;
    let branch_ref = match repo.find_branch(branch, BranchType::Local) {
      Ok(b) => b,
      Err(_) => repo.branch(branch, &head, false).map_err(classify)?,
    };
    let name = path
      .file_name()
      .and_then(|n| n.to_str())
      .ok_or_else(|| ScmError::Failed(format!("invalid worktree path {}", path.display())))?;
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).map_err(|e| ScmError::Transient(e.to_string()))?;
    }
    let reference = branch_ref.into_reference();
    let mut opts = WorktreeAddOptions::new();
    opts.reference(Some(&reference));
    repo.worktree(name, path, Some(&opts)).map_err(classify)?;
    Ok(())
  }

  fn remove_worktree(&self, repo_root: &Path, path: &Path, branch: &str) -> Result<(), ScmError> {
    let repo = git2::Repository::open(repo_root).map_err(classify)?;
    if path.exists() {
      fs::remove_dir_all(path).map_err(|e| ScmError::Transient(e.to_string()))?;
    }
    let name = path
      .file_name()
      .and_then(|n| n.to_str())
      .ok_or_else(|| ScmError::Failed(format!("invalid worktree path {}", path.display())))?;
    if let Ok(wt) = repo.find_worktree(name) {
      let mut opts = WorktreePruneOptions::new();
      opts.valid(true).working_tree(true);
      wt.prune(Some(&mut opts)).map_err(classify)?;
    }
    if let Ok(mut b) = repo.find_branch(branch, BranchType::Local) {
      b.delete().map_err(classify)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn naming_helpers() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path();
    assert_eq!(workspace_branch_name("issue-12-fix-login"), "centy/issue-12-fix-login");
    assert_eq!(
      workspace_worktree_path(root, "issue-12-fix-login"),
      root.join(".centy/worktrees/issue-12-fix-login")
    );
  }

  #[test]
  fn transient_classification() {
    assert!(ScmError::Transient("lock".into()).is_transient());
    assert!(!ScmError::Failed("bad ref".into()).is_transient());
  }
}
