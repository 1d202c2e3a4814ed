use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use centy_core::adapters::git::{self, ScmError, SourceControl};
use centy_core::adapters::process::{LaunchError, ProcessHandle, ProcessLauncher};
use centy_core::config::Config;
use centy_core::domain::entity::EntityId;
use centy_core::domain::workspace::{ConflictDecision, WorkspaceState};
use centy_core::error::CoreError;
use centy_core::events::EventBus;
use centy_core::store::StateFile;
use centy_core::workspace::{OpenRequest, WorkspaceManager};
use test_support::poll_until;

/// Worktree operations simulated with plain directories.
struct FakeScm {
  transient_failures: AtomicUsize,
}

impl FakeScm {
  fn new() -> Self {
    Self {
      transient_failures: AtomicUsize::new(0),
    }
  }

  fn failing_once() -> Self {
    Self {
      transient_failures: AtomicUsize::new(1),
    }
  }
}

impl SourceControl for FakeScm {
  fn create_worktree(&self, _repo: &Path, path: &Path, _branch: &str) -> Result<(), ScmError> {
    if self
      .transient_failures
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok()
    {
      return Err(ScmError::Transient("index is locked".into()));
    }
    std::fs::create_dir_all(path).map_err(|e| ScmError::Failed(e.to_string()))
  }

  fn remove_worktree(&self, _repo: &Path, path: &Path, _branch: &str) -> Result<(), ScmError> {
    if path.exists() {
      std::fs::remove_dir_all(path).map_err(|e| ScmError::Transient(e.to_string()))?;
    }
    Ok(())
  }
}

/// Worktree creation blocks until the gate opens, pinning a workspace in
/// `Provisioning` for as long as the test needs.
struct GatedScm {
  gate: Arc<AtomicBool>,
}

impl SourceControl for GatedScm {
  fn create_worktree(&self, _repo: &Path, path: &Path, _branch: &str) -> Result<(), ScmError> {
    while !self.gate.load(Ordering::SeqCst) {
      std::thread::sleep(Duration::from_millis(5));
    }
    std::fs::create_dir_all(path).map_err(|e| ScmError::Failed(e.to_string()))
  }

  fn remove_worktree(&self, _repo: &Path, path: &Path, _branch: &str) -> Result<(), ScmError> {
    if path.exists() {
      std::fs::remove_dir_all(path).map_err(|e| ScmError::Transient(e.to_string()))?;
    }
    Ok(())
  }
}

struct NoopHandle {
  running: AtomicBool,
}

impl ProcessHandle for NoopHandle {
  fn stop(&self) {
    self.running.store(false, Ordering::SeqCst);
  }

  fn is_running(&self) -> bool {
    self.running.load(Ordering::SeqCst)
  }
}

struct NoopLauncher;

impl ProcessLauncher for NoopLauncher {
  fn launch(&self, _command: &[String], _path: &Path) -> Result<Box<dyn ProcessHandle>, LaunchError> {
    Ok(Box::new(NoopHandle {
      running: AtomicBool::new(true),
    }))
  }

  fn available(&self, _command: &[String]) -> bool {
    true
  }
}

struct Env {
  _td: tempfile::TempDir,
  repo: PathBuf,
  registry_path: PathBuf,
  events: Arc<EventBus>,
  mgr: Arc<WorkspaceManager>,
}

fn env_with(config: Config, scm: Arc<dyn SourceControl>) -> Env {
  let td = tempfile::tempdir().unwrap();
  let repo = td.path().join("repo");
  std::fs::create_dir_all(&repo).unwrap();
  let registry_path = td.path().join("workspaces.json");
  let events = Arc::new(EventBus::new());
  let mgr = WorkspaceManager::open_registry(
    StateFile::new(registry_path.clone()),
    scm,
    Arc::new(NoopLauncher),
    Arc::clone(&events),
    config,
  )
  .unwrap();
  Env {
    _td: td,
    repo,
    registry_path,
    events,
    mgr,
  }
}

fn new_env() -> Env {
  env_with(Config::default(), Arc::new(FakeScm::new()))
}

fn request(env: &Env, token: &str) -> OpenRequest {
  OpenRequest {
    entity: None,
    project: EntityId::generate(),
    repo_path: env.repo.display().to_string(),
    token: token.to_string(),
    editor: None,
    ttl_secs: None,
  }
}

async fn wait_for_state(
  mgr: &Arc<WorkspaceManager>,
  id: centy_core::domain::workspace::WorkspaceId,
  state: WorkspaceState,
) -> bool {
  let mgr = Arc::clone(mgr);
  poll_until(Duration::from_secs(5), Duration::from_millis(10), move || {
    let mgr = Arc::clone(&mgr);
    async move { mgr.get(id).map(|w| w.state == state).unwrap_or(false) }
  })
  .await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn open_provisions_to_ready_and_close_tears_down() {
  let env = new_env();
  let ws = env.mgr.open(request(&env, "issue-1-fix-login")).unwrap();
  assert_eq!(ws.state, WorkspaceState::Requested);
  assert_eq!(ws.branch, "centy/issue-1-fix-login");

  assert!(wait_for_state(&env.mgr, ws.id, WorkspaceState::Ready).await);
  assert!(ws.path.exists());

  // The feed saw the full forward progression in order.
  let seen: Vec<WorkspaceState> = env
    .events
    .since(0)
    .into_iter()
    .filter_map(|e| match e.event {
      centy_core::events::Event::WorkspaceChanged { state, .. } => Some(state),
      _ => None,
    })
    .collect();
  assert_eq!(
    seen,
    vec![
      WorkspaceState::Requested,
      WorkspaceState::Provisioning,
      WorkspaceState::Ready
    ]
  );

  let closed = env.mgr.close(ws.id).unwrap();
  assert_eq!(closed.state, WorkspaceState::Expiring);
  assert!(wait_for_state(&env.mgr, ws.id, WorkspaceState::TornDown).await);
  assert!(!ws.path.exists());

  // Closing again is a no-op.
  let again = env.mgr.close(ws.id).unwrap();
  assert_eq!(again.state, WorkspaceState::TornDown);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transient_scm_failure_is_retried_once() {
  let env = env_with(Config::default(), Arc::new(FakeScm::failing_once()));
  let ws = env.mgr.open(request(&env, "issue-2-retry")).unwrap();
  assert!(wait_for_state(&env.mgr, ws.id, WorkspaceState::Ready).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn existing_path_conflicts_and_recreate_fresh_recovers() {
  let env = new_env();
  let token = "issue-3-occupied";
  let path = git::workspace_worktree_path(&env.repo, token);
  std::fs::create_dir_all(&path).unwrap();
  std::fs::write(path.join("stale.txt"), "old").unwrap();

  let ws = env.mgr.open(request(&env, token)).unwrap();
  assert!(wait_for_state(&env.mgr, ws.id, WorkspaceState::Conflict).await);
  let ws = env.mgr.get(ws.id).unwrap();
  assert!(
    ws.state_reason
      .as_deref()
      .is_some_and(|r| r.contains("already exists"))
  );

  env
    .mgr
    .resolve_conflict(ws.id, ConflictDecision::RecreateFresh)
    .unwrap();
  assert!(wait_for_state(&env.mgr, ws.id, WorkspaceState::Ready).await);
  assert!(path.exists());
  assert!(!path.join("stale.txt").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reuse_existing_adopts_the_directory() {
  let env = new_env();
  let token = "issue-4-reuse";
  let path = git::workspace_worktree_path(&env.repo, token);
  std::fs::create_dir_all(&path).unwrap();
  std::fs::write(path.join("keep.txt"), "work in progress").unwrap();

  let ws = env.mgr.open(request(&env, token)).unwrap();
  assert!(wait_for_state(&env.mgr, ws.id, WorkspaceState::Conflict).await);

  let ws = env
    .mgr
    .resolve_conflict(ws.id, ConflictDecision::ReuseExisting)
    .unwrap();
  assert_eq!(ws.state, WorkspaceState::Ready);
  assert!(path.join("keep.txt").exists());

  // Adopted directories are owned from here on: close removes them.
  env.mgr.close(ws.id).unwrap();
  assert!(wait_for_state(&env.mgr, ws.id, WorkspaceState::TornDown).await);
  assert!(!path.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_live_workspace_per_entity() {
  let env = new_env();
  let entity = EntityId::generate();
  let mut req = request(&env, "issue-5-first");
  req.entity = Some(entity);
  let ws = env.mgr.open(req).unwrap();
  assert!(wait_for_state(&env.mgr, ws.id, WorkspaceState::Ready).await);

  let mut second = request(&env, "issue-5-second");
  second.entity = Some(entity);
  let err = env.mgr.open(second).unwrap_err();
  assert!(matches!(err, CoreError::Conflict(_)));
  assert_eq!(env.mgr.active_for_entity(entity).unwrap().id, ws.id);

  // After teardown the entity can get a fresh workspace.
  env.mgr.close(ws.id).unwrap();
  assert!(wait_for_state(&env.mgr, ws.id, WorkspaceState::TornDown).await);
  let mut third = request(&env, "issue-5-third");
  third.entity = Some(entity);
  env.mgr.open(third).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn live_workspace_limit_is_enforced() {
  let config = Config {
    max_workspaces: 1,
    ..Config::default()
  };
  let env = env_with(config, Arc::new(FakeScm::new()));
  env.mgr.open(request(&env, "issue-6-a")).unwrap();
  let err = env.mgr.open(request(&env, "issue-6-b")).unwrap_err();
  assert!(matches!(err, CoreError::ResourceLimit(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_opens_for_one_path_yield_ready_and_conflict() {
  let env = new_env();
  let a = env.mgr.open(request(&env, "issue-7-shared")).unwrap();
  let b = env.mgr.open(request(&env, "issue-7-shared")).unwrap();

  let done = {
    let mgr = Arc::clone(&env.mgr);
    poll_until(Duration::from_secs(5), Duration::from_millis(10), move || {
      let mgr = Arc::clone(&mgr);
      async move {
        let sa = mgr.get(a.id).unwrap().state;
        let sb = mgr.get(b.id).unwrap().state;
        let settled = |s| matches!(s, WorkspaceState::Ready | WorkspaceState::Conflict);
        settled(sa) && settled(sb)
      }
    })
    .await
  };
  assert!(done);
  let states = [
    env.mgr.get(a.id).unwrap().state,
    env.mgr.get(b.id).unwrap().state,
  ];
  assert!(states.contains(&WorkspaceState::Ready));
  assert!(states.contains(&WorkspaceState::Conflict));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ttl_sweep_expires_ready_workspaces() {
  let env = new_env();
  let mut req = request(&env, "issue-8-short-lived");
  req.ttl_secs = Some(0);
  let ws = env.mgr.open(req).unwrap();
  assert!(wait_for_state(&env.mgr, ws.id, WorkspaceState::Ready).await);

  let swept = env.mgr.sweep_once();
  assert_eq!(swept, 1);
  assert!(wait_for_state(&env.mgr, ws.id, WorkspaceState::TornDown).await);

  // Nothing left to sweep.
  assert_eq!(env.mgr.sweep_once(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn extend_ttl_pushes_expiry_out() {
  let env = new_env();
  let mut req = request(&env, "issue-9-extend");
  req.ttl_secs = Some(0);
  let ws = env.mgr.open(req).unwrap();
  assert!(wait_for_state(&env.mgr, ws.id, WorkspaceState::Ready).await);

  let extended = env.mgr.extend_ttl(ws.id, 3600).unwrap();
  assert!(extended.expires_at > chrono::Utc::now());
  assert_eq!(env.mgr.sweep_once(), 0);

  env.mgr.close(ws.id).unwrap();
  assert!(wait_for_state(&env.mgr, ws.id, WorkspaceState::TornDown).await);
  let err = env.mgr.extend_ttl(ws.id, 3600).unwrap_err();
  assert!(matches!(err, CoreError::InvalidState(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn closing_a_conflicted_workspace_keeps_the_owners_path_lock() {
  let env = new_env();
  let token = "issue-11-shared";
  let a = env.mgr.open(request(&env, token)).unwrap();
  assert!(wait_for_state(&env.mgr, a.id, WorkspaceState::Ready).await);

  // A second open for the same path conflicts; closing it must not
  // release the lock the ready owner still holds.
  let b = env.mgr.open(request(&env, token)).unwrap();
  assert!(wait_for_state(&env.mgr, b.id, WorkspaceState::Conflict).await);
  env.mgr.close(b.id).unwrap();
  assert!(wait_for_state(&env.mgr, b.id, WorkspaceState::TornDown).await);

  let c = env.mgr.open(request(&env, token)).unwrap();
  assert!(wait_for_state(&env.mgr, c.id, WorkspaceState::Conflict).await);
  let err = env
    .mgr
    .resolve_conflict(c.id, ConflictDecision::ReuseExisting)
    .unwrap_err();
  assert!(matches!(err, CoreError::ResourceConflict(_)));

  // Tearing the conflicted workspace down leaves the owner untouched.
  env.mgr.close(c.id).unwrap();
  assert!(wait_for_state(&env.mgr, c.id, WorkspaceState::TornDown).await);
  assert_eq!(env.mgr.get(a.id).unwrap().state, WorkspaceState::Ready);
  assert!(a.path.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn close_during_provisioning_cancels_and_tears_down() {
  let gate = Arc::new(AtomicBool::new(false));
  let env = env_with(
    Config::default(),
    Arc::new(GatedScm {
      gate: Arc::clone(&gate),
    }),
  );
  let ws = env.mgr.open(request(&env, "issue-12-cancelled")).unwrap();
  assert!(wait_for_state(&env.mgr, ws.id, WorkspaceState::Provisioning).await);

  // Close lands while the worktree is still being created.
  env.mgr.close(ws.id).unwrap();
  gate.store(true, Ordering::SeqCst);

  assert!(wait_for_state(&env.mgr, ws.id, WorkspaceState::TornDown).await);
  assert!(!ws.path.exists());

  // The accepted close won: the feed never announced ready.
  let seen: Vec<WorkspaceState> = env
    .events
    .since(0)
    .into_iter()
    .filter_map(|e| match e.event {
      centy_core::events::Event::WorkspaceChanged { state, .. } => Some(state),
      _ => None,
    })
    .collect();
  assert!(!seen.contains(&WorkspaceState::Ready));
  assert!(seen.contains(&WorkspaceState::TornDown));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn restart_reconciles_missing_worktrees() {
  let td_keep;
  let (repo, registry_path, ws_id, ws_path) = {
    let env = new_env();
    let ws = env.mgr.open(request(&env, "issue-10-crash")).unwrap();
    assert!(wait_for_state(&env.mgr, ws.id, WorkspaceState::Ready).await);
    let ws = env.mgr.get(ws.id).unwrap();
    // Simulate the worktree vanishing while the daemon was down.
    std::fs::remove_dir_all(&ws.path).unwrap();
    td_keep = env._td;
    (env.repo, env.registry_path, ws.id, ws.path)
  };
  let _ = &td_keep;
  let _ = &repo;

  let events = Arc::new(EventBus::new());
  let mgr = WorkspaceManager::open_registry(
    StateFile::new(registry_path),
    Arc::new(FakeScm::new()),
    Arc::new(NoopLauncher),
    events,
    Config::default(),
  )
  .unwrap();
  assert_eq!(mgr.get(ws_id).unwrap().state, WorkspaceState::Ready);

  mgr.reconcile().await;
  assert!(wait_for_state(&mgr, ws_id, WorkspaceState::TornDown).await);
  assert!(!ws_path.exists());
}
