use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::entity::{
  DocFields, DocStatus, Entity, EntityBody, EntityId, EntityKind, EntityPatch, IssueFields,
  IssueStatus, NewEntity, PrFields, PrStatus, ProjectFields, ProjectStatus, slugify,
};
use crate::error::{CoreError, Result};

use super::{Store, counter_key};

pub const MIN_PRIORITY: u32 = 1;
pub const MAX_PRIORITY: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ListFilter {
  #[serde(default)]
  pub project: Option<EntityId>,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default)]
  pub include_removed: bool,
  #[serde(default)]
  pub include_archived: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
  #[default]
  CreatedAt,
  UpdatedAt,
  Priority,
  DisplayNumber,
  Status,
  Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
  #[default]
  Asc,
  Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SortSpec {
  #[serde(default)]
  pub field: SortField,
  #[serde(default)]
  pub direction: SortDirection,
}

fn check_title(label: &str, s: &str) -> Result<()> {
  if s.trim().is_empty() {
    return Err(CoreError::Validation(format!("{label} must not be empty")));
  }
  Ok(())
}

fn check_priority(p: u32) -> Result<()> {
  if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&p) {
    return Err(CoreError::Validation(format!(
      "priority must be between {MIN_PRIORITY} and {MAX_PRIORITY}, got {p}"
    )));
  }
  Ok(())
}

fn check_branches(source: &str, target: &str) -> Result<()> {
  if source.trim().is_empty() || target.trim().is_empty() {
    return Err(CoreError::Validation(
      "source and target branches must not be empty".to_string(),
    ));
  }
  if source == target {
    return Err(CoreError::Validation(format!(
      "source and target branch must differ, both are `{source}`"
    )));
  }
  Ok(())
}

impl Store {
  /// Create a new entity. For issues and PRs the per-project display number
  /// is reserved inside the same critical section as the insert, so
  /// concurrent creations never collide.
  pub fn create(&self, new: NewEntity) -> Result<Entity> {
    let mut state = self.state.write().expect("store lock poisoned");

    // Validate caller-supplied fields and the project reference up front so
    // nothing is mutated on rejection.
    let project_ref = match &new {
      NewEntity::Project { name, repo_path } => {
        check_title("project name", name)?;
        if repo_path.trim().is_empty() {
          return Err(CoreError::Validation("repo_path must not be empty".to_string()));
        }
        None
      }
      NewEntity::Issue { project, title, priority, .. } => {
        check_title("issue title", title)?;
        check_priority(*priority)?;
        Some(*project)
      }
      NewEntity::PullRequest {
        project,
        title,
        priority,
        source_branch,
        target_branch,
        ..
      } => {
        check_title("pull request title", title)?;
        check_priority(*priority)?;
        check_branches(source_branch, target_branch)?;
        Some(*project)
      }
      NewEntity::Doc { project, title, .. } => {
        check_title("doc title", title)?;
        Some(*project)
      }
    };

    if let Some(project) = project_ref {
      match state.entities.get(&project) {
        Some(p) if p.kind() == EntityKind::Project && !p.removed => {}
        Some(_) => {
          return Err(CoreError::Validation(format!(
            "{project} is not an active project"
          )));
        }
        None => return Err(CoreError::NotFound(format!("project {project}"))),
      }
    }

    let kind = new.kind();
    let counter = project_ref
      .filter(|_| kind.has_display_number())
      .map(|project| counter_key(project, kind));
    let display_number = counter.as_ref().map(|key| {
      let next = state.counters.get(key).copied().unwrap_or(0) + 1;
      state.counters.insert(key.clone(), next);
      next
    });

    let now = Utc::now();
    let body = match new {
      NewEntity::Project { name, repo_path } => EntityBody::Project(ProjectFields {
        name,
        repo_path,
        status: ProjectStatus::Active,
        archived: false,
      }),
      NewEntity::Issue {
        project,
        title,
        description,
        priority,
      } => EntityBody::Issue(IssueFields {
        project,
        display_number: display_number.unwrap_or(0),
        title,
        description,
        priority,
        status: IssueStatus::Open,
      }),
      NewEntity::PullRequest {
        project,
        title,
        description,
        priority,
        source_branch,
        target_branch,
        reviewers,
      } => EntityBody::PullRequest(PrFields {
        project,
        display_number: display_number.unwrap_or(0),
        title,
        description,
        priority,
        status: PrStatus::Draft,
        source_branch,
        target_branch,
        reviewers,
      }),
      NewEntity::Doc {
        project,
        slug,
        title,
        content,
      } => {
        let slug = slug.unwrap_or_else(|| slugify(&title));
        if state.entities.values().any(|e| {
          !e.removed
            && matches!(&e.body, EntityBody::Doc(d) if d.project == project && d.slug == slug)
        }) {
          // Roll the counter state back (docs have none, but keep the guard
          // symmetric with the persist rollback below).
          return Err(CoreError::Conflict(format!("doc slug `{slug}` already exists")));
        }
        EntityBody::Doc(DocFields {
          project,
          slug,
          title,
          content,
          status: DocStatus::Draft,
        })
      }
    };

    let entity = Entity {
      id: EntityId::generate(),
      version: 1,
      created_at: now,
      updated_at: now,
      removed: false,
      body,
    };
    state.entities.insert(entity.id, entity.clone());

    if let Err(e) = self.persist(&state) {
      state.entities.remove(&entity.id);
      if let (Some(key), Some(n)) = (counter.as_ref(), display_number) {
        state.counters.insert(key.clone(), n - 1);
      }
      return Err(e);
    }

    info!(
      event = "entity_created",
      id = %entity.id,
      kind = kind.label(),
      display_number,
      "entity created"
    );
    Ok(entity)
  }

  pub fn get(&self, id: EntityId) -> Result<Entity> {
    let state = self.state.read().expect("store lock poisoned");
    state
      .entities
      .get(&id)
      .cloned()
      .ok_or_else(|| CoreError::NotFound(format!("entity {id}")))
  }

  /// Apply a partial update under optimistic concurrency: the caller's
  /// expected version must match or the update fails with `Conflict` and the
  /// caller re-reads and retries. Never retried server-side.
  pub fn update(&self, id: EntityId, expected_version: u64, patch: EntityPatch) -> Result<Entity> {
    let mut state = self.state.write().expect("store lock poisoned");
    let previous = state
      .entities
      .get(&id)
      .cloned()
      .ok_or_else(|| CoreError::NotFound(format!("entity {id}")))?;
    if previous.removed {
      return Err(CoreError::InvalidState(format!(
        "entity {id} is removed; restore it first"
      )));
    }
    if previous.version != expected_version {
      return Err(CoreError::Conflict(format!(
        "version mismatch for {id}: expected {expected_version}, current {}",
        previous.version
      )));
    }

    let mut next = previous.clone();
    apply_patch(&mut next.body, patch)?;
    next.version += 1;
    next.updated_at = Utc::now();
    state.entities.insert(id, next.clone());

    if let Err(e) = self.persist(&state) {
      state.entities.insert(id, previous);
      return Err(e);
    }

    info!(event = "entity_updated", id = %id, version = next.version, "entity updated");
    Ok(next)
  }

  pub fn list(&self, kind: EntityKind, filter: &ListFilter, sort: &SortSpec) -> Vec<Entity> {
    let state = self.state.read().expect("store lock poisoned");
    let mut out: Vec<Entity> = state
      .entities
      .values()
      .filter(|e| e.kind() == kind)
      .filter(|e| filter.include_removed || !e.removed)
      .filter(|e| filter.include_archived || !e.body.archived())
      .filter(|e| filter.project.is_none_or(|p| e.body.project() == Some(p)))
      .filter(|e| {
        filter
          .status
          .as_deref()
          .is_none_or(|s| e.body.status_str() == s)
      })
      .cloned()
      .collect();

    out.sort_by(|a, b| {
      let ord = match sort.field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::Priority => priority_of(a).cmp(&priority_of(b)),
        SortField::DisplayNumber => a.body.display_number().cmp(&b.body.display_number()),
        SortField::Status => a.body.status_str().cmp(b.body.status_str()),
        SortField::Title => a.body.title().cmp(b.body.title()),
      };
      // Ids break ties so the order is total and stable across calls.
      let ord = ord.then_with(|| a.id.cmp(&b.id));
      match sort.direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
      }
    });
    out
  }

  /// Set the archived flag. Projects only.
  pub fn set_archived(&self, id: EntityId, archived: bool) -> Result<Entity> {
    let mut state = self.state.write().expect("store lock poisoned");
    let previous = state
      .entities
      .get(&id)
      .cloned()
      .ok_or_else(|| CoreError::NotFound(format!("entity {id}")))?;
    let mut next = previous.clone();
    match &mut next.body {
      EntityBody::Project(f) => f.archived = archived,
      _ => {
        return Err(CoreError::Validation(
          "only projects can be archived".to_string(),
        ));
      }
    }
    next.version += 1;
    next.updated_at = Utc::now();
    state.entities.insert(id, next.clone());
    if let Err(e) = self.persist(&state) {
      state.entities.insert(id, previous);
      return Err(e);
    }
    info!(event = "entity_archived", id = %id, archived, "project archive flag set");
    Ok(next)
  }

  /// Soft delete. Reversible via `restore`; the hard-purge horizon is out of
  /// scope for the daemon.
  pub fn remove(&self, id: EntityId) -> Result<Entity> {
    self.set_removed(id, true)
  }

  pub fn restore(&self, id: EntityId) -> Result<Entity> {
    self.set_removed(id, false)
  }

  fn set_removed(&self, id: EntityId, removed: bool) -> Result<Entity> {
    let mut state = self.state.write().expect("store lock poisoned");
    let previous = state
      .entities
      .get(&id)
      .cloned()
      .ok_or_else(|| CoreError::NotFound(format!("entity {id}")))?;
    if previous.removed == removed {
      // Idempotent for safe client retries.
      return Ok(previous);
    }
    let mut next = previous.clone();
    next.removed = removed;
    next.version += 1;
    next.updated_at = Utc::now();
    state.entities.insert(id, next.clone());
    if let Err(e) = self.persist(&state) {
      state.entities.insert(id, previous);
      return Err(e);
    }
    info!(event = "entity_removed_flag", id = %id, removed, "soft-remove flag set");
    Ok(next)
  }
}

fn priority_of(e: &Entity) -> u32 {
  match &e.body {
    EntityBody::Issue(f) => f.priority,
    EntityBody::PullRequest(f) => f.priority,
    _ => 0,
  }
}

fn reject_unknown_fields(patch: &EntityPatch, kind: EntityKind) -> Result<()> {
  let branch_fields =
    patch.source_branch.is_some() || patch.target_branch.is_some() || patch.reviewers.is_some();
  if branch_fields && kind != EntityKind::PullRequest {
    return Err(CoreError::Validation(format!(
      "branch/reviewer fields do not apply to {}",
      kind.label()
    )));
  }
  if patch.content.is_some() && kind != EntityKind::Doc {
    return Err(CoreError::Validation(format!(
      "content does not apply to {}",
      kind.label()
    )));
  }
  if patch.name.is_some() && kind != EntityKind::Project {
    return Err(CoreError::Validation(format!(
      "name does not apply to {}",
      kind.label()
    )));
  }
  if patch.priority.is_some() && !matches!(kind, EntityKind::Issue | EntityKind::PullRequest) {
    return Err(CoreError::Validation(format!(
      "priority does not apply to {}",
      kind.label()
    )));
  }
  Ok(())
}

fn apply_patch(body: &mut EntityBody, patch: EntityPatch) -> Result<()> {
  reject_unknown_fields(&patch, body.kind())?;
  if let Some(p) = patch.priority {
    check_priority(p)?;
  }

  match body {
    EntityBody::Project(f) => {
      if let Some(name) = patch.name {
        check_title("project name", &name)?;
        f.name = name;
      }
      if let Some(status) = patch.status {
        f.status = ProjectStatus::parse(&status)
          .ok_or_else(|| CoreError::Validation(format!("unknown project status `{status}`")))?;
      }
    }
    EntityBody::Issue(f) => {
      if let Some(title) = patch.title {
        check_title("issue title", &title)?;
        f.title = title;
      }
      if let Some(description) = patch.description {
        f.description = description;
      }
      if let Some(priority) = patch.priority {
        f.priority = priority;
      }
      if let Some(status) = patch.status {
        f.status = IssueStatus::parse(&status)
          .ok_or_else(|| CoreError::Validation(format!("unknown issue status `{status}`")))?;
      }
    }
    EntityBody::PullRequest(f) => {
      if let Some(title) = patch.title {
        check_title("pull request title", &title)?;
        f.title = title;
      }
      if let Some(description) = patch.description {
        f.description = description;
      }
      if let Some(priority) = patch.priority {
        f.priority = priority;
      }
      if let Some(source) = patch.source_branch {
        f.source_branch = source;
      }
      if let Some(target) = patch.target_branch {
        f.target_branch = target;
      }
      check_branches(&f.source_branch, &f.target_branch)?;
      if let Some(reviewers) = patch.reviewers {
        f.reviewers = reviewers;
      }
      if let Some(status) = patch.status {
        f.status = PrStatus::parse(&status)
          .ok_or_else(|| CoreError::Validation(format!("unknown pr status `{status}`")))?;
      }
    }
    EntityBody::Doc(f) => {
      if let Some(title) = patch.title {
        check_title("doc title", &title)?;
        f.title = title;
      }
      if let Some(content) = patch.content {
        f.content = content;
      }
      if let Some(status) = patch.status {
        f.status = DocStatus::parse(&status)
          .ok_or_else(|| CoreError::Validation(format!("unknown doc status `{status}`")))?;
      }
    }
  }
  Ok(())
}
