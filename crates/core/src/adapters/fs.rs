use std::fs;
use std::path::{Path, PathBuf};

/// Path of the entity state document under the daemon data root.
pub fn entities_path(data_root: &Path) -> PathBuf {
  data_root.join("entities.json")
}

/// Path of the workspace registry document under the daemon data root.
pub fn workspaces_path(data_root: &Path) -> PathBuf {
  data_root.join("workspaces.json")
}

pub fn logs_path(data_root: &Path) -> PathBuf {
  data_root.join("logs.jsonl")
}

/// Return path to the `.centy` folder inside the given repository root.
pub fn centy_dir(repo_root: &Path) -> PathBuf {
  repo_root.join(".centy")
}

pub fn worktrees_dir(repo_root: &Path) -> PathBuf {
  centy_dir(repo_root).join("worktrees")
}

/// Ensure the daemon data root exists (directories are created if missing).
pub fn ensure_data_root(data_root: &Path) -> std::io::Result<()> {
  fs::create_dir_all(data_root)
}

/// Ensure the `.centy/worktrees` layout exists inside a repository.
pub fn ensure_repo_layout(repo_root: &Path) -> std::io::Result<()> {
  fs::create_dir_all(worktrees_dir(repo_root))
}
