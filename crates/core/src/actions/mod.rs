//! Pure projection of entity state onto the ordered list of permitted
//! actions. Nothing here touches the stores; the service layer assembles an
//! [`ActionState`] snapshot and clients render the result verbatim.

use serde::{Deserialize, Serialize};

use crate::domain::entity::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
  Workflow,
  Edit,
  Workspace,
  Links,
  Danger,
}

/// Transient, computed action row. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
  pub id: String,
  pub label: String,
  pub category: ActionCategory,
  pub enabled: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub disabled_reason: Option<String>,
  pub destructive: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub shortcut: Option<String>,
}

/// Snapshot of everything an action predicate may inspect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ActionState {
  pub status: String,
  #[serde(default)]
  pub archived: bool,
  #[serde(default)]
  pub removed: bool,
  #[serde(default)]
  pub has_active_workspace: bool,
  #[serde(default)]
  pub link_count: usize,
}

/// Returns `Some(reason)` when the action is disabled for this state.
type DisabledCheck = fn(&ActionState) -> Option<String>;

struct ActionSpec {
  id: &'static str,
  label: &'static str,
  category: ActionCategory,
  shortcut: Option<&'static str>,
  destructive: bool,
  disabled: DisabledCheck,
}

fn always_enabled(_: &ActionState) -> Option<String> {
  None
}

fn needs_workspace(s: &ActionState) -> Option<String> {
  if s.has_active_workspace {
    None
  } else {
    Some("no active workspace".to_string())
  }
}

fn no_workspace(s: &ActionState) -> Option<String> {
  if s.has_active_workspace {
    Some("workspace already open".to_string())
  } else {
    None
  }
}

fn needs_links(s: &ActionState) -> Option<String> {
  if s.link_count == 0 {
    Some("entity has no links".to_string())
  } else {
    None
  }
}

fn deletable(s: &ActionState) -> Option<String> {
  if s.has_active_workspace {
    Some("cannot delete: entity has active workspace".to_string())
  } else {
    None
  }
}

fn status_is(want: &str) -> impl Fn(&ActionState) -> bool + '_ {
  move |s: &ActionState| s.status == want
}

fn unless_status(s: &ActionState, blocked: &str, reason: &str) -> Option<String> {
  if s.status == blocked {
    Some(reason.to_string())
  } else {
    None
  }
}

// Tables are declared in the order clients render them; grouping by category
// is stable because resolve preserves declaration order.

static PROJECT_ACTIONS: &[ActionSpec] = &[
  ActionSpec {
    id: "edit",
    label: "Edit project",
    category: ActionCategory::Edit,
    shortcut: Some("e"),
    destructive: false,
    disabled: always_enabled,
  },
  ActionSpec {
    id: "complete",
    label: "Mark completed",
    category: ActionCategory::Workflow,
    shortcut: Some("c"),
    destructive: false,
    disabled: |s| unless_status(s, "completed", "project is already completed"),
  },
  ActionSpec {
    id: "archive",
    label: "Archive",
    category: ActionCategory::Workflow,
    shortcut: Some("a"),
    destructive: false,
    disabled: |s| {
      if s.archived {
        Some("project is already archived".to_string())
      } else {
        None
      }
    },
  },
  ActionSpec {
    id: "unarchive",
    label: "Unarchive",
    category: ActionCategory::Workflow,
    shortcut: Some("A"),
    destructive: false,
    disabled: |s| {
      if s.archived {
        None
      } else {
        Some("project is not archived".to_string())
      }
    },
  },
  ActionSpec {
    id: "remove",
    label: "Delete project",
    category: ActionCategory::Danger,
    shortcut: Some("d"),
    destructive: true,
    disabled: always_enabled,
  },
];

static ISSUE_ACTIONS: &[ActionSpec] = &[
  ActionSpec {
    id: "edit",
    label: "Edit issue",
    category: ActionCategory::Edit,
    shortcut: Some("e"),
    destructive: false,
    disabled: always_enabled,
  },
  ActionSpec {
    id: "start_progress",
    label: "Start progress",
    category: ActionCategory::Workflow,
    shortcut: Some("s"),
    destructive: false,
    disabled: |s| {
      if status_is("open")(s) {
        None
      } else {
        Some(format!("issue is {}", s.status))
      }
    },
  },
  ActionSpec {
    id: "close",
    label: "Close issue",
    category: ActionCategory::Workflow,
    shortcut: Some("c"),
    destructive: false,
    disabled: |s| unless_status(s, "closed", "issue is already closed"),
  },
  ActionSpec {
    id: "reopen",
    label: "Reopen issue",
    category: ActionCategory::Workflow,
    shortcut: Some("o"),
    destructive: false,
    disabled: |s| {
      if status_is("closed")(s) {
        None
      } else {
        Some("issue is not closed".to_string())
      }
    },
  },
  ActionSpec {
    id: "open_workspace",
    label: "Open workspace",
    category: ActionCategory::Workspace,
    shortcut: Some("w"),
    destructive: false,
    disabled: no_workspace,
  },
  ActionSpec {
    id: "close_workspace",
    label: "Close workspace",
    category: ActionCategory::Workspace,
    shortcut: Some("W"),
    destructive: false,
    disabled: needs_workspace,
  },
  ActionSpec {
    id: "link",
    label: "Add link",
    category: ActionCategory::Links,
    shortcut: Some("l"),
    destructive: false,
    disabled: always_enabled,
  },
  ActionSpec {
    id: "unlink",
    label: "Remove link",
    category: ActionCategory::Links,
    shortcut: Some("L"),
    destructive: false,
    disabled: needs_links,
  },
  ActionSpec {
    id: "remove",
    label: "Delete issue",
    category: ActionCategory::Danger,
    shortcut: Some("d"),
    destructive: true,
    disabled: deletable,
  },
];

static PR_ACTIONS: &[ActionSpec] = &[
  ActionSpec {
    id: "edit",
    label: "Edit pull request",
    category: ActionCategory::Edit,
    shortcut: Some("e"),
    destructive: false,
    disabled: always_enabled,
  },
  ActionSpec {
    id: "mark_ready",
    label: "Mark ready for review",
    category: ActionCategory::Workflow,
    shortcut: Some("r"),
    destructive: false,
    disabled: |s| {
      if status_is("draft")(s) {
        None
      } else {
        Some("pull request is not a draft".to_string())
      }
    },
  },
  ActionSpec {
    id: "merge",
    label: "Merge",
    category: ActionCategory::Workflow,
    shortcut: Some("m"),
    destructive: false,
    disabled: |s| {
      if status_is("open")(s) {
        None
      } else {
        Some(format!("pull request is {}", s.status))
      }
    },
  },
  ActionSpec {
    id: "close",
    label: "Close pull request",
    category: ActionCategory::Workflow,
    shortcut: Some("c"),
    destructive: false,
    disabled: |s| {
      if status_is("merged")(s) || status_is("closed")(s) {
        Some(format!("pull request is {}", s.status))
      } else {
        None
      }
    },
  },
  ActionSpec {
    id: "open_workspace",
    label: "Open workspace",
    category: ActionCategory::Workspace,
    shortcut: Some("w"),
    destructive: false,
    disabled: no_workspace,
  },
  ActionSpec {
    id: "close_workspace",
    label: "Close workspace",
    category: ActionCategory::Workspace,
    shortcut: Some("W"),
    destructive: false,
    disabled: needs_workspace,
  },
  ActionSpec {
    id: "link",
    label: "Add link",
    category: ActionCategory::Links,
    shortcut: Some("l"),
    destructive: false,
    disabled: always_enabled,
  },
  ActionSpec {
    id: "unlink",
    label: "Remove link",
    category: ActionCategory::Links,
    shortcut: Some("L"),
    destructive: false,
    disabled: needs_links,
  },
  ActionSpec {
    id: "remove",
    label: "Delete pull request",
    category: ActionCategory::Danger,
    shortcut: Some("d"),
    destructive: true,
    disabled: deletable,
  },
];

static DOC_ACTIONS: &[ActionSpec] = &[
  ActionSpec {
    id: "edit",
    label: "Edit doc",
    category: ActionCategory::Edit,
    shortcut: Some("e"),
    destructive: false,
    disabled: always_enabled,
  },
  ActionSpec {
    id: "publish",
    label: "Publish",
    category: ActionCategory::Workflow,
    shortcut: Some("p"),
    destructive: false,
    disabled: |s| unless_status(s, "published", "doc is already published"),
  },
  ActionSpec {
    id: "unpublish",
    label: "Unpublish",
    category: ActionCategory::Workflow,
    shortcut: Some("P"),
    destructive: false,
    disabled: |s| {
      if status_is("published")(s) {
        None
      } else {
        Some("doc is not published".to_string())
      }
    },
  },
  ActionSpec {
    id: "link",
    label: "Add link",
    category: ActionCategory::Links,
    shortcut: Some("l"),
    destructive: false,
    disabled: always_enabled,
  },
  ActionSpec {
    id: "unlink",
    label: "Remove link",
    category: ActionCategory::Links,
    shortcut: Some("L"),
    destructive: false,
    disabled: needs_links,
  },
  ActionSpec {
    id: "remove",
    label: "Delete doc",
    category: ActionCategory::Danger,
    shortcut: Some("d"),
    destructive: true,
    disabled: always_enabled,
  },
];

fn table_for(kind: EntityKind) -> &'static [ActionSpec] {
  match kind {
    EntityKind::Project => PROJECT_ACTIONS,
    EntityKind::Issue => ISSUE_ACTIONS,
    EntityKind::PullRequest => PR_ACTIONS,
    EntityKind::Doc => DOC_ACTIONS,
  }
}

/// Compute the ordered action list for an entity kind and state snapshot.
/// Deterministic: identical inputs always produce identical output, in the
/// declared table order.
pub fn resolve(kind: EntityKind, state: &ActionState) -> Vec<ActionDescriptor> {
  let mut out = Vec::new();
  for spec in table_for(kind) {
    // A removed entity only offers restore; everything else is disabled.
    let disabled_reason = if state.removed && spec.id != "restore" {
      Some("entity is removed".to_string())
    } else {
      (spec.disabled)(state)
    };
    out.push(ActionDescriptor {
      id: spec.id.to_string(),
      label: spec.label.to_string(),
      category: spec.category,
      enabled: disabled_reason.is_none(),
      disabled_reason,
      destructive: spec.destructive,
      shortcut: spec.shortcut.map(|s| s.to_string()),
    });
  }
  // Restore closes the soft-delete loop on every kind.
  out.push(ActionDescriptor {
    id: "restore".to_string(),
    label: "Restore".to_string(),
    category: ActionCategory::Danger,
    enabled: state.removed,
    disabled_reason: if state.removed {
      None
    } else {
      Some("entity is not removed".to_string())
    },
    destructive: false,
    shortcut: None,
  });
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn open_issue() -> ActionState {
    ActionState {
      status: "open".into(),
      ..ActionState::default()
    }
  }

  #[test]
  fn resolve_is_deterministic() {
    let state = open_issue();
    let a = resolve(EntityKind::Issue, &state);
    let b = resolve(EntityKind::Issue, &state);
    assert_eq!(a, b);
  }

  #[test]
  fn table_order_is_stable_not_alphabetical() {
    let ids: Vec<String> = resolve(EntityKind::Issue, &open_issue())
      .into_iter()
      .map(|a| a.id)
      .collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_ne!(ids, sorted, "order must follow the declared table");
    assert_eq!(ids.first().map(String::as_str), Some("edit"));
    assert_eq!(ids.last().map(String::as_str), Some("restore"));
  }

  #[test]
  fn delete_blocked_by_active_workspace() {
    let state = ActionState {
      status: "open".into(),
      has_active_workspace: true,
      ..ActionState::default()
    };
    let actions = resolve(EntityKind::Issue, &state);
    let remove = actions.iter().find(|a| a.id == "remove").unwrap();
    assert!(!remove.enabled);
    assert_eq!(
      remove.disabled_reason.as_deref(),
      Some("cannot delete: entity has active workspace")
    );
    let open_ws = actions.iter().find(|a| a.id == "open_workspace").unwrap();
    assert!(!open_ws.enabled);
    let close_ws = actions.iter().find(|a| a.id == "close_workspace").unwrap();
    assert!(close_ws.enabled);
  }

  #[test]
  fn removed_entity_only_offers_restore() {
    let state = ActionState {
      status: "open".into(),
      removed: true,
      ..ActionState::default()
    };
    for action in resolve(EntityKind::Doc, &state) {
      if action.id == "restore" {
        assert!(action.enabled);
      } else {
        assert!(!action.enabled, "{} should be disabled", action.id);
        assert_eq!(action.disabled_reason.as_deref(), Some("entity is removed"));
      }
    }
  }

  #[test]
  fn merged_pr_cannot_merge_again() {
    let state = ActionState {
      status: "merged".into(),
      ..ActionState::default()
    };
    let actions = resolve(EntityKind::PullRequest, &state);
    let merge = actions.iter().find(|a| a.id == "merge").unwrap();
    assert!(!merge.enabled);
    assert_eq!(merge.disabled_reason.as_deref(), Some("pull request is merged"));
  }

  #[test]
  fn every_disabled_action_has_a_reason() {
    for kind in [
      EntityKind::Project,
      EntityKind::Issue,
      EntityKind::PullRequest,
      EntityKind::Doc,
    ] {
      for status in ["open", "closed", "draft", "merged", "active", "published"] {
        let state = ActionState {
          status: status.into(),
          ..ActionState::default()
        };
        for action in resolve(kind, &state) {
          assert_eq!(
            action.enabled,
            action.disabled_reason.is_none(),
            "{:?}/{}: reason iff disabled",
            kind,
            action.id
          );
        }
      }
    }
  }
}
