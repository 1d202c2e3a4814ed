//! Wire types for the JSON-RPC surface. Domain types serialize directly
//! where the wire shape matches; params live here.

use serde::{Deserialize, Serialize};

use crate::actions::ActionDescriptor;
use crate::domain::entity::{Entity, EntityId, EntityKind, EntityPatch, NewEntity};
use crate::domain::link::{LinkEntry, LinkKind, LinkRecord};
use crate::domain::workspace::{ConflictDecision, Workspace, WorkspaceId};
use crate::events::EventEnvelope;
use crate::store::{ListFilter, SortSpec};

/// Response type for daemon.status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DaemonStatus {
  pub version: String,
  pub pid: u32,
  pub socket_path: String,
  pub uptime_secs: u64,
}

// ---- Entity store DTOs ----

pub type EntityCreateParams = NewEntity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EntityGetParams {
  pub id: EntityId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EntityUpdateParams {
  pub id: EntityId,
  /// Version the client read; a mismatch rejects the update.
  pub expected_version: u64,
  pub patch: EntityPatch,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EntityListParams {
  pub kind: EntityKind,
  #[serde(default, flatten)]
  pub filter: ListFilter,
  #[serde(default)]
  pub sort: Option<SortSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EntityListResponse {
  pub entities: Vec<Entity>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EntityArchiveParams {
  pub id: EntityId,
  pub archived: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ActionsResponse {
  pub actions: Vec<ActionDescriptor>,
}

// ---- Link graph DTOs ----

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LinkParams {
  pub from: EntityId,
  pub to: EntityId,
  pub kind: LinkKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LinkAddResponse {
  pub forward: LinkRecord,
  pub inverse: LinkRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LinkListResponse {
  pub links: Vec<LinkEntry>,
}

// ---- Workspace DTOs ----

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WorkspaceOpenParams {
  /// Issue or PR to bind; `None` opens a standalone workspace.
  #[serde(default)]
  pub entity: Option<EntityId>,
  /// Required for standalone workspaces; ignored when `entity` is given.
  #[serde(default)]
  pub project: Option<EntityId>,
  #[serde(default)]
  pub editor: Option<String>,
  #[serde(default)]
  pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WorkspaceRefParams {
  pub id: WorkspaceId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WorkspaceResolveConflictParams {
  pub id: WorkspaceId,
  pub decision: ConflictDecision,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WorkspaceExtendTtlParams {
  pub id: WorkspaceId,
  pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub struct WorkspaceListParams {
  #[serde(default)]
  pub project: Option<EntityId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct WorkspaceListResponse {
  pub workspaces: Vec<Workspace>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EditorDescriptor {
  pub id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub display_name: Option<String>,
  pub command: Vec<String>,
  /// Whether the executable resolves on the daemon's PATH right now.
  pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EditorListResponse {
  pub editors: Vec<EditorDescriptor>,
}

// ---- Event feed DTOs ----

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub struct EventsNextParams {
  /// Cursor: only events with a greater sequence number are returned.
  #[serde(default)]
  pub after_seq: u64,
  /// How long to wait for the first new event before returning empty.
  #[serde(default)]
  pub wait_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EventsNextResponse {
  pub events: Vec<EventEnvelope>,
  pub latest_seq: u64,
}
