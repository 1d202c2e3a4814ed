use super::types::{Config, ConfigError, Result};

pub(super) fn validate_editors(cfg: &Config) -> Result<()> {
  for (name, editor_cfg) in &cfg.editors {
    if editor_cfg.command.is_empty() {
      return Err(ConfigError::InvalidEditorDefinition {
        editor: name.to_string(),
      });
    }
  }

  if let Some(editor) = cfg.default_editor.as_ref()
    && !cfg.editors.contains_key(editor)
  {
    return Err(ConfigError::MissingEditorDefinition {
      editor: editor.to_string(),
    });
  }

  Ok(())
}
