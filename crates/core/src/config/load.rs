use std::collections::BTreeMap;
use std::fs;

use serde::{Deserialize, Serialize};

use super::paths::global_config_path;
use super::types::{Config, EditorConfig, LogLevel, Result};
use super::validate::validate_editors;

/// Load configuration by resolving the default global path.
/// Global config overrides built-in defaults.
pub fn load() -> Result<Config> {
  let mut cfg = Config::default();

  if let Some(global_path) = global_config_path()
    && let Ok(s) = fs::read_to_string(&global_path)
  {
    let partial: PartialConfig = toml::from_str(&s)?;
    cfg = partial.merge_over(cfg);
  }

  validate_editors(&cfg)?;

  Ok(cfg)
}

/// Test helper: load configuration from an explicit file path (if present).
#[cfg(test)]
pub(crate) fn load_from_path(path: &std::path::Path) -> Result<Config> {
  let mut cfg = Config::default();

  if let Ok(s) = fs::read_to_string(path) {
    let partial: PartialConfig = toml::from_str(&s)?;
    cfg = partial.merge_over(cfg);
  }

  validate_editors(&cfg)?;

  Ok(cfg)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
struct PartialConfig {
  pub log_level: Option<LogLevel>,
  pub default_ttl_secs: Option<u64>,
  pub sweep_interval_secs: Option<u64>,
  pub max_workspaces: Option<usize>,
  pub provision_timeout_secs: Option<u64>,
  pub teardown_timeout_secs: Option<u64>,
  pub default_editor: Option<String>,
  pub editors: Option<BTreeMap<String, EditorConfig>>,
}

impl PartialConfig {
  fn merge_over(self, base: Config) -> Config {
    let PartialConfig {
      log_level,
      default_ttl_secs,
      sweep_interval_secs,
      max_workspaces,
      provision_timeout_secs,
      teardown_timeout_secs,
      default_editor,
      editors,
    } = self;

    let Config {
      log_level: base_log_level,
      default_ttl_secs: base_default_ttl_secs,
      sweep_interval_secs: base_sweep_interval_secs,
      max_workspaces: base_max_workspaces,
      provision_timeout_secs: base_provision_timeout_secs,
      teardown_timeout_secs: base_teardown_timeout_secs,
      default_editor: base_default_editor,
      editors: base_editors,
    } = base;

    let mut merged_editors = base_editors;
    if let Some(overrides) = editors {
      for (name, cfg) in overrides {
        merged_editors.insert(name, cfg);
      }
    }

    Config {
      log_level: log_level.unwrap_or(base_log_level),
      default_ttl_secs: default_ttl_secs.unwrap_or(base_default_ttl_secs),
      sweep_interval_secs: sweep_interval_secs.unwrap_or(base_sweep_interval_secs),
      max_workspaces: max_workspaces.unwrap_or(base_max_workspaces),
      provision_timeout_secs: provision_timeout_secs.unwrap_or(base_provision_timeout_secs),
      teardown_timeout_secs: teardown_timeout_secs.unwrap_or(base_teardown_timeout_secs),
      default_editor: default_editor.or(base_default_editor),
      editors: merged_editors,
    }
  }
}
