use std::env;
use std::path::PathBuf;

use dirs::data_dir;
use dirs::runtime_dir;

use super::types::{ConfigError, Result};

/// Location of the global config file (~/.config/centy/config.toml)
pub fn global_config_path() -> Option<PathBuf> {
  dirs::config_dir().map(|p| p.join("centy").join("config.toml"))
}

/// Resolve the socket path using CENTY_SOCKET or platform defaults.
pub fn resolve_socket_path() -> Result<PathBuf> {
  let env_socket = env::var("CENTY_SOCKET").ok().map(PathBuf::from);
  // Prefer runtime_dir for ephemeral sockets; fall back to data_dir
  let base_dir = runtime_dir().or(data_dir());
  if let Some(val) = env_socket {
    return Ok(val);
  }
  if let Some(dir) = base_dir {
    return Ok(dir.join("centy.sock"));
  }
  Err(ConfigError::UnsupportedPlatform)
}

/// Resolve the daemon data root using CENTY_DATA_DIR or the platform data dir.
pub fn resolve_data_root() -> Result<PathBuf> {
  if let Ok(val) = env::var("CENTY_DATA_DIR") {
    return Ok(PathBuf::from(val));
  }
  data_dir()
    .map(|d| d.join("centy"))
    .ok_or(ConfigError::UnsupportedPlatform)
}
