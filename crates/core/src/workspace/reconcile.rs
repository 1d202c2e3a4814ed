//! Startup recovery: bring the persisted registry back in line with what
//! is actually on disk after a crash or restart.

use tracing::{info, warn};

use crate::domain::workspace::{WorkspaceId, WorkspaceState};

use super::WorkspaceManager;

impl WorkspaceManager {
  /// Reconcile persisted workspace records against the filesystem.
  ///
  /// - `Requested`/`Provisioning`: a half-created path becomes `Conflict`
  ///   for an explicit decision; otherwise provisioning restarts.
  /// - `Ready`: the path lock is re-acquired; a missing worktree means the
  ///   workspace is gone and is marked `TornDown`.
  /// - `Expiring`: teardown resumes.
  /// - `Conflict` and `Failed` wait for the client as before.
  pub async fn reconcile(&self) {
    let snapshot: Vec<_> = {
      let reg = self.registry.read().expect("registry lock poisoned");
      reg.values().cloned().collect()
    };

    let mut resumed = 0usize;
    for ws in snapshot {
      match ws.state {
        WorkspaceState::Requested | WorkspaceState::Provisioning => {
          resumed += 1;
          if ws.path.exists() {
            let _ = self.set_state(
              ws.id,
              WorkspaceState::Conflict,
              Some("daemon restarted during provisioning".into()),
            );
          } else {
            self.respawn_provision(ws.id);
          }
        }
        WorkspaceState::Ready => {
          if ws.path.exists() {
            if !self.lock_path(ws.id, &ws.path) {
              warn!(event = "reconcile_path_collision", id = %ws.id, "path already locked");
            }
          } else {
            resumed += 1;
            // The worktree vanished under us; nothing left to tear down.
            let _ = self.set_state(ws.id, WorkspaceState::Expiring, Some("worktree missing after restart".into()));
            self.respawn_teardown(ws.id);
          }
        }
        WorkspaceState::Expiring => {
          resumed += 1;
          if ws.provisioned {
            self.lock_path(ws.id, &ws.path);
          }
          self.respawn_teardown(ws.id);
        }
        WorkspaceState::Conflict | WorkspaceState::Failed | WorkspaceState::TornDown => {}
      }
    }

    if resumed > 0 {
      info!(event = "workspace_reconciled", resumed, "recovered workspaces after restart");
    }
  }

  fn respawn_provision(&self, id: WorkspaceId) {
    if let Some(mgr) = self.me.upgrade() {
      tokio::spawn(async move {
        mgr.provision(id, false).await;
      });
    }
  }

  fn respawn_teardown(&self, id: WorkspaceId) {
    if let Some(mgr) = self.me.upgrade() {
      tokio::spawn(async move {
        mgr.teardown(id).await;
      });
    }
  }
}
