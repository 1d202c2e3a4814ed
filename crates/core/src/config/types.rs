use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::defaults::builtin_editors;

/// Log level for the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
  Off,
  Warn,
  #[default]
  Info,
  Debug,
  Trace,
}

/// Configuration for launching an editor inside a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorConfig {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub display_name: Option<String>,
  /// Command template; `$CENTY_WORKSPACE_PATH` is replaced with the
  /// workspace path at launch time.
  pub command: Vec<String>,
}

/// Effective configuration after merging defaults and the global config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
  pub log_level: LogLevel,
  /// Default workspace lifetime in seconds (defaults to 8 hours)
  pub default_ttl_secs: u64,
  /// How often the expiry sweeper runs (defaults to 5)
  pub sweep_interval_secs: u64,
  /// Max live workspaces across all projects (defaults to 8)
  pub max_workspaces: usize,
  /// Upper bound on a single provisioning attempt
  pub provision_timeout_secs: u64,
  /// Upper bound on a single teardown attempt
  pub teardown_timeout_secs: u64,
  /// Editor launched by `workspace.open` when none is given (vscode | shell | custom key)
  #[serde(default)]
  pub default_editor: Option<String>,
  /// Editor command definitions resolved by the daemon when opening workspaces.
  pub editors: BTreeMap<String, EditorConfig>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      log_level: LogLevel::Info,
      default_ttl_secs: 8 * 60 * 60,
      sweep_interval_secs: 5,
      max_workspaces: 8,
      provision_timeout_secs: 60,
      teardown_timeout_secs: 60,
      default_editor: None,
      editors: builtin_editors(),
    }
  }
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("io: {0}")]
  Io(#[from] std::io::Error),
  #[error("toml: {0}")]
  Toml(#[from] toml::de::Error),
  #[error("unsupported platform: windows is not supported")]
  UnsupportedPlatform,
  #[error("editor `{editor}` is required but not configured")]
  MissingEditorDefinition { editor: String },
  #[error("editor `{editor}` must have a non-empty command")]
  InvalidEditorDefinition { editor: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
