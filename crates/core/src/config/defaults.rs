use std::collections::BTreeMap;

use super::types::EditorConfig;

pub(crate) fn builtin_editors() -> BTreeMap<String, EditorConfig> {
  let mut editors = BTreeMap::new();
  editors.insert(
    "vscode".to_string(),
    EditorConfig {
      display_name: Some("Visual Studio Code".to_string()),
      command: vec![
        "code".to_string(),
        "--new-window".to_string(),
        "$CENTY_WORKSPACE_PATH".to_string(),
      ],
    },
  );
  editors.insert(
    "shell".to_string(),
    EditorConfig {
      display_name: Some("Shell".to_string()),
      command: vec!["sh".to_string()],
    },
  );
  editors
}
