use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

/// Token replaced with the workspace path in editor command templates.
pub const WORKSPACE_PATH_TOKEN: &str = "$CENTY_WORKSPACE_PATH";

#[derive(Debug, Error)]
pub enum LaunchError {
  #[error("command is empty")]
  EmptyCommand,
  #[error("executable '{0}' not found on PATH")]
  NotFound(String),
  #[error("spawn '{program}': {source}")]
  Spawn {
    program: String,
    source: std::io::Error,
  },
}

/// Substitute the workspace path token in every argument of a command
/// template. Arguments without the token pass through unchanged.
pub fn substitute_tokens(template: &[String], workspace_path: &Path) -> Vec<String> {
  let path = workspace_path.display().to_string();
  template
    .iter()
    .map(|arg| arg.replace(WORKSPACE_PATH_TOKEN, &path))
    .collect()
}

/// Handle on a launched editor or agent process.
pub trait ProcessHandle: Send + Sync {
  /// Best-effort stop; a process that already exited is not an error.
  fn stop(&self);
  fn is_running(&self) -> bool;
}

impl std::fmt::Debug for dyn ProcessHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str("ProcessHandle")
  }
}

/// Launches editor and agent processes inside a workspace. Tests substitute
/// a fake to observe launches without spawning anything.
pub trait ProcessLauncher: Send + Sync {
  fn launch(
    &self,
    command: &[String],
    workspace_path: &Path,
  ) -> Result<Box<dyn ProcessHandle>, LaunchError>;

  /// Whether the command's executable is present on PATH.
  fn available(&self, command: &[String]) -> bool;
}

pub struct HostLauncher;

impl ProcessLauncher for HostLauncher {
  fn launch(
    &self,
    command: &[String],
    workspace_path: &Path,
  ) -> Result<Box<dyn ProcessHandle>, LaunchError> {
    let argv = substitute_tokens(command, workspace_path);
    let (program, args) = argv.split_first().ok_or(LaunchError::EmptyCommand)?;
    if which(program).is_none() {
      return Err(LaunchError::NotFound(program.clone()));
    }
    let child = Command::new(program)
      .args(args)
      .current_dir(workspace_path)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .spawn()
      .map_err(|e| LaunchError::Spawn {
        program: program.clone(),
        source: e,
      })?;
    debug!(
      event = "process_launched",
      program,
      pid = child.id(),
      cwd = %workspace_path.display()
    );
    Ok(Box::new(ChildHandle {
      child: Mutex::new(child),
    }))
  }

  fn available(&self, command: &[String]) -> bool {
    command.first().is_some_and(|p| which(p).is_some())
  }
}

struct ChildHandle {
  child: Mutex<Child>,
}

impl ProcessHandle for ChildHandle {
  fn stop(&self) {
    if let Ok(mut child) = self.child.lock() {
      let _ = child.kill();
      let _ = child.wait();
    }
  }

  fn is_running(&self) -> bool {
    self
      .child
      .lock()
      .map(|mut c| matches!(c.try_wait(), Ok(None)))
      .unwrap_or(false)
  }
}

/// Resolve `program` to an executable path by walking PATH entries.
#[must_use]
pub fn which(program: &str) -> Option<PathBuf> {
  let has_sep = program.contains(std::path::MAIN_SEPARATOR);
  if has_sep {
    let candidate = PathBuf::from(program);
    return if is_executable(&candidate) {
      Some(candidate)
    } else {
      None
    };
  }

  let paths = std::env::var_os("PATH")?;
  std::env::split_paths(&paths)
    .map(|dir| dir.join(program))
    .find(|candidate| is_executable(candidate))
}

/// Returns true when `path` points to a regular executable file.
#[must_use]
fn is_executable(path: &Path) -> bool {
  if !path.is_file() {
    return false;
  }
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt as _;
    std::fs::metadata(path)
      .map(|meta| meta.permissions().mode() & 0o111 != 0)
      .unwrap_or(false)
  }
  #[cfg(not(unix))]
  {
    true
  }
}
