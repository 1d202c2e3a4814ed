use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use super::entity::EntityId;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct WorkspaceId(pub Uuid);

impl WorkspaceId {
  pub fn generate() -> Self {
    Self(Uuid::new_v4())
  }

  /// Short token used in standalone workspace names.
  pub fn short(&self) -> String {
    self.0.simple().to_string()[..8].to_string()
  }
}

impl fmt::Display for WorkspaceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceState {
  Requested,
  Provisioning,
  /// The target path/branch already exists; an explicit client decision is
  /// required before provisioning can resume.
  Conflict,
  Ready,
  Expiring,
  TornDown,
  /// Retryable terminal error (deadline exceeded, external tool failure).
  Failed,
}

impl WorkspaceState {
  /// Live states count against resource limits and the one-workspace-per-
  /// entity rule.
  pub fn is_live(&self) -> bool {
    !matches!(self, WorkspaceState::TornDown | WorkspaceState::Failed)
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, WorkspaceState::TornDown)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      WorkspaceState::Requested => "requested",
      WorkspaceState::Provisioning => "provisioning",
      WorkspaceState::Conflict => "conflict",
      WorkspaceState::Ready => "ready",
      WorkspaceState::Expiring => "expiring",
      WorkspaceState::TornDown => "torn_down",
      WorkspaceState::Failed => "failed",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictDecision {
  ReuseExisting,
  RecreateFresh,
}

#[derive(Debug, Error)]
pub enum WorkspaceError {
  #[error("invalid transition: {from:?} -> {to:?}")]
  InvalidTransition {
    from: WorkspaceState,
    to: WorkspaceState,
  },
}

/// Ephemeral working directory backed by a git worktree, bound to an
/// issue/PR or standalone. The process handle lives in the manager's
/// runtime registry, never in the persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
  pub id: WorkspaceId,
  /// Bound issue or pull request; `None` for standalone workspaces.
  pub entity: Option<EntityId>,
  pub project: EntityId,
  pub repo_path: String,
  pub path: PathBuf,
  pub branch: String,
  #[serde(default)]
  pub editor: Option<String>,
  pub created_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
  pub state: WorkspaceState,
  /// Human-readable detail for conflict/failed states.
  #[serde(default)]
  pub state_reason: Option<String>,
  /// Whether this daemon created (or reclaimed) the worktree; teardown only
  /// removes filesystem state it owns.
  #[serde(default)]
  pub provisioned: bool,
}

impl Workspace {
  pub fn can_transition(from: WorkspaceState, to: WorkspaceState) -> bool {
    use WorkspaceState::*;
    matches!(
      (from, to),
      (Requested, Provisioning)
        | (Requested, Conflict)
        | (Provisioning, Ready)
        | (Provisioning, Conflict)
        | (Provisioning, Expiring)
        | (Provisioning, Failed)
        | (Conflict, Provisioning)
        | (Conflict, Ready)
        | (Conflict, Expiring)
        | (Conflict, Failed)
        | (Ready, Expiring)
        | (Ready, TornDown)
        | (Ready, Failed)
        | (Expiring, TornDown)
        | (Expiring, Failed)
        | (Failed, Expiring)
    )
  }

  pub fn transition_to(&mut self, to: WorkspaceState) -> Result<(), WorkspaceError> {
    let from = self.state;
    if Self::can_transition(from, to) {
      self.state = to;
      Ok(())
    } else {
      Err(WorkspaceError::InvalidTransition { from, to })
    }
  }

  pub fn expired(&self, now: DateTime<Utc>) -> bool {
    self.state == WorkspaceState::Ready && now >= self.expires_at
  }
}
