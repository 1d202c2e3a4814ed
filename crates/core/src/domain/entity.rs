use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Globally unique, immutable entity identifier.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EntityId(pub Uuid);

impl EntityId {
  pub fn generate() -> Self {
    Self(Uuid::new_v4())
  }
}

impl fmt::Display for EntityId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
  Project,
  Issue,
  PullRequest,
  Doc,
}

impl EntityKind {
  pub fn label(&self) -> &'static str {
    match self {
      EntityKind::Project => "project",
      EntityKind::Issue => "issue",
      EntityKind::PullRequest => "pr",
      EntityKind::Doc => "doc",
    }
  }

  /// Kinds that carry a per-project display number.
  pub fn has_display_number(&self) -> bool {
    matches!(self, EntityKind::Issue | EntityKind::PullRequest)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
  #[default]
  Active,
  Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
  #[default]
  Open,
  InProgress,
  Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrStatus {
  Draft,
  #[default]
  Open,
  Merged,
  Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocStatus {
  #[default]
  Draft,
  Published,
}

impl ProjectStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      ProjectStatus::Active => "active",
      ProjectStatus::Completed => "completed",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "active" => Some(ProjectStatus::Active),
      "completed" => Some(ProjectStatus::Completed),
      _ => None,
    }
  }
}

impl IssueStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      IssueStatus::Open => "open",
      IssueStatus::InProgress => "in_progress",
      IssueStatus::Closed => "closed",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "open" => Some(IssueStatus::Open),
      "in_progress" => Some(IssueStatus::InProgress),
      "closed" => Some(IssueStatus::Closed),
      _ => None,
    }
  }
}

impl PrStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      PrStatus::Draft => "draft",
      PrStatus::Open => "open",
      PrStatus::Merged => "merged",
      PrStatus::Closed => "closed",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "draft" => Some(PrStatus::Draft),
      "open" => Some(PrStatus::Open),
      "merged" => Some(PrStatus::Merged),
      "closed" => Some(PrStatus::Closed),
      _ => None,
    }
  }
}

impl DocStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      DocStatus::Draft => "draft",
      DocStatus::Published => "published",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "draft" => Some(DocStatus::Draft),
      "published" => Some(DocStatus::Published),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFields {
  pub name: String,
  /// Absolute path to the git repository this project tracks.
  pub repo_path: String,
  pub status: ProjectStatus,
  pub archived: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueFields {
  pub project: EntityId,
  pub display_number: u32,
  pub title: String,
  pub description: String,
  /// 1 = highest, 5 = lowest.
  pub priority: u32,
  pub status: IssueStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrFields {
  pub project: EntityId,
  pub display_number: u32,
  pub title: String,
  pub description: String,
  pub priority: u32,
  pub status: PrStatus,
  pub source_branch: String,
  pub target_branch: String,
  #[serde(default)]
  pub reviewers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocFields {
  pub project: EntityId,
  pub slug: String,
  pub title: String,
  pub content: String,
  pub status: DocStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityBody {
  Project(ProjectFields),
  Issue(IssueFields),
  PullRequest(PrFields),
  Doc(DocFields),
}

impl EntityBody {
  pub fn kind(&self) -> EntityKind {
    match self {
      EntityBody::Project(_) => EntityKind::Project,
      EntityBody::Issue(_) => EntityKind::Issue,
      EntityBody::PullRequest(_) => EntityKind::PullRequest,
      EntityBody::Doc(_) => EntityKind::Doc,
    }
  }

  /// Owning project, for everything but projects themselves.
  pub fn project(&self) -> Option<EntityId> {
    match self {
      EntityBody::Project(_) => None,
      EntityBody::Issue(f) => Some(f.project),
      EntityBody::PullRequest(f) => Some(f.project),
      EntityBody::Doc(f) => Some(f.project),
    }
  }

  pub fn display_number(&self) -> Option<u32> {
    match self {
      EntityBody::Issue(f) => Some(f.display_number),
      EntityBody::PullRequest(f) => Some(f.display_number),
      _ => None,
    }
  }

  pub fn title(&self) -> &str {
    match self {
      EntityBody::Project(f) => &f.name,
      EntityBody::Issue(f) => &f.title,
      EntityBody::PullRequest(f) => &f.title,
      EntityBody::Doc(f) => &f.title,
    }
  }

  pub fn status_str(&self) -> &'static str {
    match self {
      EntityBody::Project(f) => f.status.as_str(),
      EntityBody::Issue(f) => f.status.as_str(),
      EntityBody::PullRequest(f) => f.status.as_str(),
      EntityBody::Doc(f) => f.status.as_str(),
    }
  }

  pub fn archived(&self) -> bool {
    match self {
      EntityBody::Project(f) => f.archived,
      _ => false,
    }
  }
}

/// Persisted domain object. `version` starts at 1 and increments on every
/// successful update; callers supply the version they read to detect
/// concurrent edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
  pub id: EntityId,
  pub version: u64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  #[serde(default)]
  pub removed: bool,
  #[serde(flatten)]
  pub body: EntityBody,
}

impl Entity {
  pub fn kind(&self) -> EntityKind {
    self.body.kind()
  }
}

/// Caller-supplied fields for `create`. Display numbers, ids, timestamps,
/// and versions are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NewEntity {
  Project {
    name: String,
    repo_path: String,
  },
  Issue {
    project: EntityId,
    title: String,
    #[serde(default)]
    description: String,
    priority: u32,
  },
  PullRequest {
    project: EntityId,
    title: String,
    #[serde(default)]
    description: String,
    priority: u32,
    source_branch: String,
    target_branch: String,
    #[serde(default)]
    reviewers: Vec<String>,
  },
  Doc {
    project: EntityId,
    #[serde(default)]
    slug: Option<String>,
    title: String,
    #[serde(default)]
    content: String,
  },
}

impl NewEntity {
  pub fn kind(&self) -> EntityKind {
    match self {
      NewEntity::Project { .. } => EntityKind::Project,
      NewEntity::Issue { .. } => EntityKind::Issue,
      NewEntity::PullRequest { .. } => EntityKind::PullRequest,
      NewEntity::Doc { .. } => EntityKind::Doc,
    }
  }
}

/// Partial update applied by `update`. Fields that do not apply to the
/// entity's kind are rejected with a validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EntityPatch {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub content: Option<String>,
  #[serde(default)]
  pub priority: Option<u32>,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default)]
  pub source_branch: Option<String>,
  #[serde(default)]
  pub target_branch: Option<String>,
  #[serde(default)]
  pub reviewers: Option<Vec<String>>,
}

/// Lowercase a title into a filesystem/branch-safe slug.
pub fn slugify(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut last_dash = true;
  for c in s.chars() {
    if c.is_ascii_alphanumeric() {
      out.push(c.to_ascii_lowercase());
      last_dash = false;
    } else if !last_dash {
      out.push('-');
      last_dash = true;
    }
  }
  let trimmed = out.trim_end_matches('-');
  if trimmed.is_empty() {
    "untitled".to_string()
  } else {
    trimmed.chars().take(40).collect::<String>().trim_end_matches('-').to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_round_trips() {
    for s in [IssueStatus::Open, IssueStatus::InProgress, IssueStatus::Closed] {
      assert_eq!(IssueStatus::parse(s.as_str()), Some(s));
    }
    for s in [PrStatus::Draft, PrStatus::Open, PrStatus::Merged, PrStatus::Closed] {
      assert_eq!(PrStatus::parse(s.as_str()), Some(s));
    }
    assert_eq!(IssueStatus::parse("merged"), None);
  }

  #[test]
  fn slugify_basics() {
    assert_eq!(slugify("Fix crash on startup"), "fix-crash-on-startup");
    assert_eq!(slugify("  weird -- punctuation!!"), "weird-punctuation");
    assert_eq!(slugify("!!!"), "untitled");
  }

  #[test]
  fn slugify_truncates() {
    let long = "a".repeat(100);
    assert_eq!(slugify(&long).len(), 40);
  }

  #[test]
  fn body_serde_tags_by_kind() {
    let body = EntityBody::Issue(IssueFields {
      project: EntityId::generate(),
      display_number: 7,
      title: "t".into(),
      description: String::new(),
      priority: 2,
      status: IssueStatus::Open,
    });
    let v = serde_json::to_value(&body).unwrap();
    assert_eq!(v["kind"], "issue");
    assert_eq!(v["display_number"], 7);
    let back: EntityBody = serde_json::from_value(v).unwrap();
    assert_eq!(back, body);
  }
}
