//! Workspace lifecycle: ephemeral git-worktree-backed working directories
//! bound to an issue or PR (or standalone), with a TTL sweeper and crash
//! recovery at startup.
//!
//! Client-facing methods mutate the registry in short synchronous sections
//! and hand the slow parts (worktree creation, teardown, editor launch) to
//! spawned tasks. No lock is ever held across an await.

mod reconcile;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::adapters::process::{ProcessHandle, ProcessLauncher};
use crate::adapters::git::SourceControl;
use crate::config::Config;
use crate::domain::entity::{EntityId, EntityKind, slugify};
use crate::domain::workspace::{
  ConflictDecision, Workspace, WorkspaceId, WorkspaceState,
};
use crate::error::{CoreError, Result};
use crate::events::{Event, EventBus};
use crate::store::StateFile;

/// Naming token for a workspace bound to a numbered entity, e.g.
/// `issue-12-fix-login-crash`.
pub fn entity_workspace_token(kind: EntityKind, display_number: u32, title: &str) -> String {
  format!("{}-{}-{}", kind.label(), display_number, slugify(title))
}

/// Naming token for a standalone workspace, e.g. `adhoc-3f9c01ab`.
pub fn adhoc_workspace_token(id: WorkspaceId) -> String {
  format!("adhoc-{}", id.short())
}

#[derive(Debug, Clone)]
pub struct OpenRequest {
  /// Bound issue or PR; `None` opens a standalone workspace.
  pub entity: Option<EntityId>,
  pub project: EntityId,
  pub repo_path: String,
  /// Naming token; determines the worktree path and branch.
  pub token: String,
  pub editor: Option<String>,
  pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryState {
  #[serde(default)]
  workspaces: HashMap<WorkspaceId, Workspace>,
}

pub struct WorkspaceManager {
  /// Self-reference so `&self` methods can hand an owning clone to the
  /// background tasks they spawn.
  me: Weak<WorkspaceManager>,
  registry: RwLock<HashMap<WorkspaceId, Workspace>>,
  /// Paths currently owned by a workspace, keyed to the owner. Ownership,
  /// not guards, so the map can be consulted between awaits and a
  /// non-owner's teardown cannot release someone else's path.
  path_locks: Mutex<HashMap<PathBuf, WorkspaceId>>,
  processes: Mutex<HashMap<WorkspaceId, Box<dyn ProcessHandle>>>,
  /// Workspaces closed while still provisioning; the provisioning task
  /// checks this at its checkpoints.
  cancels: Mutex<HashSet<WorkspaceId>>,
  scm: Arc<dyn SourceControl>,
  launcher: Arc<dyn ProcessLauncher>,
  events: Arc<EventBus>,
  file: StateFile,
  config: Config,
}

impl WorkspaceManager {
  pub fn open_registry(
    file: StateFile,
    scm: Arc<dyn SourceControl>,
    launcher: Arc<dyn ProcessLauncher>,
    events: Arc<EventBus>,
    config: Config,
  ) -> std::io::Result<Arc<Self>> {
    let state: RegistryState = file.load()?;
    Ok(Arc::new_cyclic(|me| Self {
      me: me.clone(),
      registry: RwLock::new(state.workspaces),
      path_locks: Mutex::new(HashMap::new()),
      processes: Mutex::new(HashMap::new()),
      cancels: Mutex::new(HashSet::new()),
      scm,
      launcher,
      events,
      file,
      config,
    }))
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Whether the first element of an editor command resolves on PATH.
  pub fn probe_editor(&self, command: &[String]) -> bool {
    self.launcher.available(command)
  }

  /// Request a new workspace. The returned record is in `Requested`;
  /// provisioning continues in the background and is observable through
  /// the event feed.
  pub fn open(&self, req: OpenRequest) -> Result<Workspace> {
    if let Some(key) = &req.editor
      && !self.config.editors.contains_key(key)
    {
      return Err(CoreError::EditorUnavailable(format!(
        "unknown editor '{key}'"
      )));
    }

    let repo_root = PathBuf::from(&req.repo_path);
    let path = crate::adapters::git::workspace_worktree_path(&repo_root, &req.token);
    let branch = crate::adapters::git::workspace_branch_name(&req.token);
    let now = Utc::now();
    let ttl = req.ttl_secs.unwrap_or(self.config.default_ttl_secs);

    let ws = {
      let mut reg = self.registry.write().expect("registry lock poisoned");
      let live = reg.values().filter(|w| w.state.is_live()).count();
      if live >= self.config.max_workspaces {
        return Err(CoreError::ResourceLimit(format!(
          "max live workspaces reached ({})",
          self.config.max_workspaces
        )));
      }
      if let Some(entity) = req.entity
        && reg
          .values()
          .any(|w| w.entity == Some(entity) && w.state.is_live())
      {
        return Err(CoreError::Conflict(format!(
          "entity {entity} already has an active workspace"
        )));
      }

      let ws = Workspace {
        id: WorkspaceId::generate(),
        entity: req.entity,
        project: req.project,
        repo_path: req.repo_path.clone(),
        path,
        branch,
        editor: req.editor.clone(),
        created_at: now,
        expires_at: now + chrono::Duration::seconds(ttl as i64),
        state: WorkspaceState::Requested,
        state_reason: None,
        provisioned: false,
      };
      reg.insert(ws.id, ws.clone());
      if let Err(e) = self.persist_registry(&reg) {
        reg.remove(&ws.id);
        return Err(e);
      }
      ws
    };

    info!(
      event = "workspace_requested",
      id = %ws.id,
      path = %ws.path.display(),
      branch = %ws.branch,
      "workspace requested"
    );
    self.publish_change(&ws);

    if let Some(mgr) = self.me.upgrade() {
      let id = ws.id;
      tokio::spawn(async move {
        mgr.provision(id, false).await;
      });
    }

    Ok(ws)
  }

  pub fn get(&self, id: WorkspaceId) -> Result<Workspace> {
    let reg = self.registry.read().expect("registry lock poisoned");
    reg
      .get(&id)
      .cloned()
      .ok_or_else(|| CoreError::NotFound(format!("workspace {id}")))
  }

  /// All workspaces, optionally scoped to a project, oldest first.
  /// Terminal records are kept until the next daemon restart so clients
  /// can observe `torn_down`.
  pub fn list(&self, project: Option<EntityId>) -> Vec<Workspace> {
    let reg = self.registry.read().expect("registry lock poisoned");
    let mut out: Vec<Workspace> = reg
      .values()
      .filter(|w| project.is_none_or(|p| w.project == p))
      .cloned()
      .collect();
    out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    out
  }

  /// The live workspace bound to an entity, if any.
  pub fn active_for_entity(&self, entity: EntityId) -> Option<Workspace> {
    let reg = self.registry.read().expect("registry lock poisoned");
    reg
      .values()
      .find(|w| w.entity == Some(entity) && w.state.is_live())
      .cloned()
  }

  /// Resolve a `Conflict` workspace with an explicit client decision.
  pub fn resolve_conflict(
    &self,
    id: WorkspaceId,
    decision: ConflictDecision,
  ) -> Result<Workspace> {
    let ws = self.get(id)?;
    if ws.state != WorkspaceState::Conflict {
      return Err(CoreError::InvalidState(format!(
        "workspace {id} is {}, not conflict",
        ws.state.as_str()
      )));
    }

    match decision {
      ConflictDecision::ReuseExisting if ws.path.exists() => {
        if !self.lock_path(id, &ws.path) {
          return Err(CoreError::ResourceConflict(format!(
            "path {} is held by another workspace",
            ws.path.display()
          )));
        }
        // The daemon adopts the existing directory and owns it from here.
        self.mark_provisioned(id);
        let reason = self.launch_editor(&ws).err();
        self.set_state(id, WorkspaceState::Ready, reason)
      }
      // Nothing left to reuse; fall through to a fresh provision.
      ConflictDecision::ReuseExisting => {
        let ws = self.set_state(id, WorkspaceState::Provisioning, None)?;
        if let Some(mgr) = self.me.upgrade() {
          tokio::spawn(async move {
            mgr.provision(id, false).await;
          });
        }
        Ok(ws)
      }
      ConflictDecision::RecreateFresh => {
        let ws = self.set_state(id, WorkspaceState::Provisioning, None)?;
        if let Some(mgr) = self.me.upgrade() {
          tokio::spawn(async move {
            mgr.provision(id, true).await;
          });
        }
        Ok(ws)
      }
    }
  }

  /// Close a workspace. Provisioning workspaces are flagged for
  /// cancellation; everything else moves to `Expiring` and tears down in
  /// the background. Closing a torn-down workspace is a no-op.
  pub fn close(&self, id: WorkspaceId) -> Result<Workspace> {
    let ws = self.get(id)?;
    match ws.state {
      WorkspaceState::TornDown | WorkspaceState::Expiring => Ok(ws),
      WorkspaceState::Requested | WorkspaceState::Provisioning => {
        self
          .cancels
          .lock()
          .expect("cancel set poisoned")
          .insert(id);
        // The provisioning task may have finished between the lookup and
        // the flag; close directly if it did.
        let now = self.get(id)?;
        if matches!(
          now.state,
          WorkspaceState::Conflict | WorkspaceState::Ready | WorkspaceState::Failed
        ) && self.take_cancel(id)
        {
          return self.expire_and_teardown(id);
        }
        Ok(now)
      }
      WorkspaceState::Conflict | WorkspaceState::Ready | WorkspaceState::Failed => {
        self.expire_and_teardown(id)
      }
    }
  }

  fn expire_and_teardown(&self, id: WorkspaceId) -> Result<Workspace> {
    let ws = self.set_state(id, WorkspaceState::Expiring, None)?;
    if let Some(mgr) = self.me.upgrade() {
      tokio::spawn(async move {
        mgr.teardown(id).await;
      });
    }
    Ok(ws)
  }

  /// Push the expiry out to `now + ttl_secs`. Only live, non-expiring
  /// workspaces can be extended.
  pub fn extend_ttl(&self, id: WorkspaceId, ttl_secs: u64) -> Result<Workspace> {
    let mut reg = self.registry.write().expect("registry lock poisoned");
    let ws = reg
      .get_mut(&id)
      .ok_or_else(|| CoreError::NotFound(format!("workspace {id}")))?;
    if !ws.state.is_live() || ws.state == WorkspaceState::Expiring {
      return Err(CoreError::InvalidState(format!(
        "workspace {id} is {}",
        ws.state.as_str()
      )));
    }
    let prev = ws.expires_at;
    ws.expires_at = Utc::now() + chrono::Duration::seconds(ttl_secs as i64);
    let snapshot = ws.clone();
    if let Err(e) = self.persist_registry(&reg) {
      if let Some(ws) = reg.get_mut(&id) {
        ws.expires_at = prev;
      }
      return Err(e);
    }
    Ok(snapshot)
  }

  /// One sweeper pass: move expired `Ready` workspaces to `Expiring` and
  /// start their teardown. Returns how many were picked up.
  pub fn sweep_once(&self) -> usize {
    let now = Utc::now();
    let expired: Vec<WorkspaceId> = {
      let reg = self.registry.read().expect("registry lock poisoned");
      reg
        .values()
        .filter(|w| w.expired(now))
        .map(|w| w.id)
        .collect()
    };
    for id in &expired {
      if self
        .set_state(*id, WorkspaceState::Expiring, Some("ttl expired".into()))
        .is_ok()
        && let Some(mgr) = self.me.upgrade()
      {
        let id = *id;
        tokio::spawn(async move {
          mgr.teardown(id).await;
        });
      }
    }
    expired.len()
  }

  pub fn start_sweeper(&self) -> tokio::task::JoinHandle<()> {
    let Some(mgr) = self.me.upgrade() else {
      return tokio::spawn(async {});
    };
    let every = Duration::from_secs(self.config.sweep_interval_secs.max(1));
    tokio::spawn(async move {
      let mut tick = tokio::time::interval(every);
      tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      loop {
        tick.tick().await;
        let swept = mgr.sweep_once();
        if swept > 0 {
          info!(event = "workspace_sweep", swept, "expired workspaces queued for teardown");
        }
      }
    })
  }

  // ---- background lifecycle ----

  /// Drive a workspace from `Requested`/`Provisioning` to `Ready`,
  /// `Conflict` or `Failed`. With `recreate` set, an existing target path
  /// is removed instead of conflicting.
  async fn provision(&self, id: WorkspaceId, recreate: bool) {
    let ws = match self.get(id) {
      Ok(ws) => ws,
      Err(_) => return,
    };
    let ws = if ws.state == WorkspaceState::Provisioning {
      ws
    } else {
      match self.set_state(id, WorkspaceState::Provisioning, None) {
        Ok(ws) => ws,
        Err(_) => return,
      }
    };

    if !self.lock_path(id, &ws.path) {
      let _ = self.set_state(
        id,
        WorkspaceState::Conflict,
        Some(format!(
          "path {} is held by another workspace",
          ws.path.display()
        )),
      );
      return;
    }

    if ws.path.exists() {
      if recreate {
        if let Err(reason) = self.scm_remove(&ws).await {
          self.unlock_path(id, &ws.path);
          let _ = self.set_state(id, WorkspaceState::Conflict, Some(reason));
          return;
        }
      } else {
        self.unlock_path(id, &ws.path);
        let _ = self.set_state(
          id,
          WorkspaceState::Conflict,
          Some(format!("target path {} already exists", ws.path.display())),
        );
        return;
      }
    }

    if self.take_cancel(id) {
      self.unlock_path(id, &ws.path);
      if self
        .set_state(id, WorkspaceState::Expiring, Some("closed while provisioning".into()))
        .is_ok()
      {
        self.teardown(id).await;
      }
      return;
    }

    if let Err(reason) = self.scm_create(&ws).await {
      self.unlock_path(id, &ws.path);
      let _ = self.set_state(id, WorkspaceState::Failed, Some(reason));
      return;
    }
    self.mark_provisioned(id);

    if self.take_cancel(id) {
      if self
        .set_state(id, WorkspaceState::Expiring, Some("closed while provisioning".into()))
        .is_ok()
      {
        self.teardown(id).await;
      }
      return;
    }

    // Editor launch failures leave the workspace usable; the reason is
    // surfaced on the record.
    let reason = self.launch_editor(&ws).err();
    let _ = self.set_state(id, WorkspaceState::Ready, reason);
    info!(event = "workspace_ready", id = %id, path = %ws.path.display(), "workspace provisioned");

    // A close accepted between the last checkpoint and the ready
    // transition lands here; honor it instead of leaving the flag stale.
    if self.take_cancel(id)
      && self
        .set_state(id, WorkspaceState::Expiring, Some("closed while provisioning".into()))
        .is_ok()
    {
      self.teardown(id).await;
    }
  }

  /// Tear down a workspace in `Expiring`: stop its process, remove the
  /// worktree and branch if this daemon owns them, release the path.
  async fn teardown(&self, id: WorkspaceId) {
    if let Some(handle) = self
      .processes
      .lock()
      .expect("process registry poisoned")
      .remove(&id)
    {
      handle.stop();
    }
    let ws = match self.get(id) {
      Ok(ws) => ws,
      Err(_) => return,
    };
    if ws.provisioned
      && let Err(reason) = self.scm_remove(&ws).await
    {
      let _ = self.set_state(id, WorkspaceState::Failed, Some(reason));
      return;
    }
    self.unlock_path(id, &ws.path);
    let _ = self.set_state(id, WorkspaceState::TornDown, None);
    info!(event = "workspace_torn_down", id = %id, "workspace torn down");
  }

  async fn scm_create(&self, ws: &Workspace) -> std::result::Result<(), String> {
    self
      .scm_call(ws, self.config.provision_timeout_secs, "provisioning", |scm, repo, path, branch| {
        scm.create_worktree(&repo, &path, &branch)
      })
      .await
  }

  async fn scm_remove(&self, ws: &Workspace) -> std::result::Result<(), String> {
    self
      .scm_call(ws, self.config.teardown_timeout_secs, "teardown", |scm, repo, path, branch| {
        scm.remove_worktree(&repo, &path, &branch)
      })
      .await
  }

  /// Run a blocking scm operation off the runtime with a deadline,
  /// retrying once on a transient failure.
  async fn scm_call<F>(
    &self,
    ws: &Workspace,
    timeout_secs: u64,
    what: &str,
    op: F,
  ) -> std::result::Result<(), String>
  where
    F: Fn(
        Arc<dyn SourceControl>,
        PathBuf,
        PathBuf,
        String,
      ) -> std::result::Result<(), crate::adapters::git::ScmError>
      + Send
      + Sync
      + Copy
      + 'static,
  {
    let deadline = Duration::from_secs(timeout_secs);
    let mut attempt = 0;
    loop {
      let scm = Arc::clone(&self.scm);
      let repo = PathBuf::from(&ws.repo_path);
      let path = ws.path.clone();
      let branch = ws.branch.clone();
      let res = tokio::time::timeout(
        deadline,
        tokio::task::spawn_blocking(move || op(scm, repo, path, branch)),
      )
      .await;
      match res {
        Err(_) => return Err(format!("{what} deadline exceeded after {timeout_secs}s")),
        Ok(Err(join)) => return Err(format!("{what} task failed: {join}")),
        Ok(Ok(Ok(()))) => return Ok(()),
        Ok(Ok(Err(e))) if e.is_transient() && attempt == 0 => {
          warn!(event = "scm_retry", id = %ws.id, error = %e, "transient failure, retrying");
          attempt += 1;
        }
        Ok(Ok(Err(e))) => return Err(e.to_string()),
      }
    }
  }

  /// Launch the configured editor in the workspace. `Err` carries the
  /// human-readable reason; the caller decides what it means for state.
  fn launch_editor(&self, ws: &Workspace) -> std::result::Result<(), String> {
    let key = match ws.editor.as_ref().or(self.config.default_editor.as_ref()) {
      Some(key) => key,
      None => return Ok(()),
    };
    let editor = match self.config.editors.get(key) {
      Some(editor) => editor,
      None => return Err(format!("editor '{key}' is not configured")),
    };
    match self.launcher.launch(&editor.command, &ws.path) {
      Ok(handle) => {
        self
          .processes
          .lock()
          .expect("process registry poisoned")
          .insert(ws.id, handle);
        Ok(())
      }
      Err(e) => Err(format!("editor '{key}' failed to launch: {e}")),
    }
  }

  // ---- registry plumbing ----

  fn set_state(
    &self,
    id: WorkspaceId,
    to: WorkspaceState,
    reason: Option<String>,
  ) -> Result<Workspace> {
    let snapshot = {
      let mut reg = self.registry.write().expect("registry lock poisoned");
      let ws = reg
        .get_mut(&id)
        .ok_or_else(|| CoreError::NotFound(format!("workspace {id}")))?;
      ws.transition_to(to)
        .map_err(|e| CoreError::InvalidState(e.to_string()))?;
      ws.state_reason = reason;
      let snapshot = ws.clone();
      if let Err(e) = self.persist_registry(&reg) {
        warn!(event = "registry_persist_failed", id = %id, error = %e, "workspace state not persisted");
      }
      snapshot
    };
    self.publish_change(&snapshot);
    Ok(snapshot)
  }

  pub(crate) fn mark_provisioned(&self, id: WorkspaceId) {
    let mut reg = self.registry.write().expect("registry lock poisoned");
    if let Some(ws) = reg.get_mut(&id) {
      ws.provisioned = true;
      if let Err(e) = self.persist_registry(&reg) {
        warn!(event = "registry_persist_failed", id = %id, error = %e, "workspace state not persisted");
      }
    }
  }

  fn persist_registry(&self, reg: &HashMap<WorkspaceId, Workspace>) -> Result<()> {
    let state = RegistryState {
      workspaces: reg.clone(),
    };
    self
      .file
      .save(&state)
      .map_err(|e| CoreError::Internal(format!("persist workspace registry: {e}")))
  }

  fn publish_change(&self, ws: &Workspace) {
    self.events.publish(Event::WorkspaceChanged {
      id: ws.id,
      entity: ws.entity,
      state: ws.state,
      reason: ws.state_reason.clone(),
    });
  }

  /// Acquire the path for `id`. Succeeds if the path is free or already
  /// owned by the same workspace.
  pub(crate) fn lock_path(&self, id: WorkspaceId, path: &Path) -> bool {
    let mut locks = self.path_locks.lock().expect("path lock map poisoned");
    match locks.get(path) {
      Some(owner) => *owner == id,
      None => {
        locks.insert(path.to_path_buf(), id);
        true
      }
    }
  }

  /// Release the path, but only if `id` is the owner. Conflicted
  /// workspaces that never acquired the lock must not strip it from the
  /// workspace that did.
  fn unlock_path(&self, id: WorkspaceId, path: &Path) {
    let mut locks = self.path_locks.lock().expect("path lock map poisoned");
    if locks.get(path) == Some(&id) {
      locks.remove(path);
    }
  }

  fn take_cancel(&self, id: WorkspaceId) -> bool {
    self
      .cancels
      .lock()
      .expect("cancel set poisoned")
      .remove(&id)
  }
}
