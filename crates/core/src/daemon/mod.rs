use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use std::{fs, io};

use jsonrpsee::server::RpcModule;
use tokio::task::JoinHandle;

pub mod api;
mod server;

use crate::adapters::fs as fsutil;
use crate::adapters::git::{Git2SourceControl, SourceControl};
use crate::adapters::process::{HostLauncher, ProcessLauncher};
use crate::config::Config;
use crate::events::EventBus;
use crate::store::{StateFile, Store};
use crate::workspace::WorkspaceManager;

use server::{shutdown_channel, start as start_server};

/// Shared state behind every RPC handler.
pub struct CentyContext {
  pub config: Config,
  pub socket_path: PathBuf,
  pub store: Arc<Store>,
  pub workspaces: Arc<WorkspaceManager>,
  pub events: Arc<EventBus>,
  pub started_at: Instant,
}

impl CentyContext {
  /// Wire up the context against the real host: libgit2 worktrees and
  /// processes spawned on PATH.
  pub fn init(data_root: &Path, socket_path: &Path, config: Config) -> io::Result<Self> {
    Self::init_with_adapters(
      data_root,
      socket_path,
      config,
      Arc::new(Git2SourceControl),
      Arc::new(HostLauncher),
    )
  }

  /// Like [`CentyContext::init`] but with injected adapters; tests use this
  /// to substitute fakes for source control and process launching.
  pub fn init_with_adapters(
    data_root: &Path,
    socket_path: &Path,
    config: Config,
    scm: Arc<dyn SourceControl>,
    launcher: Arc<dyn ProcessLauncher>,
  ) -> io::Result<Self> {
    fsutil::ensure_data_root(data_root)?;
    let store = Arc::new(Store::open(fsutil::entities_path(data_root))?);
    let events = Arc::new(EventBus::new());
    let workspaces = WorkspaceManager::open_registry(
      StateFile::new(fsutil::workspaces_path(data_root)),
      scm,
      launcher,
      Arc::clone(&events),
      config.clone(),
    )?;
    Ok(Self {
      config,
      socket_path: socket_path.to_path_buf(),
      store,
      workspaces,
      events,
      started_at: Instant::now(),
    })
  }
}

/// Handle to the running daemon server.
pub struct DaemonHandle {
  task: JoinHandle<()>,
  sweeper: JoinHandle<()>,
  socket_path: PathBuf,
  // Keep the server handle alive to prevent immediate shutdown
  _server_handle: jsonrpsee::server::ServerHandle,
}

impl DaemonHandle {
  /// Stop the daemon task and remove the socket file if it exists.
  pub fn stop(self) {
    self.task.abort();
    self.sweeper.abort();
    let _ = fs::remove_file(&self.socket_path);
  }

  /// Await the daemon task to finish (e.g., after an RPC shutdown).
  pub async fn wait(&mut self) {
    let _ = (&mut self.task).await;
    self.sweeper.abort();
  }

  /// Get the socket path the daemon is bound to.
  pub fn socket_path(&self) -> &Path {
    &self.socket_path
  }
}

/// Start the JSON-RPC server over a Unix domain socket, recover persisted
/// workspaces and begin the TTL sweep.
pub async fn start(ctx: CentyContext) -> io::Result<DaemonHandle> {
  let socket_path = ctx.socket_path.clone();
  let workspaces = Arc::clone(&ctx.workspaces);

  let mut module = RpcModule::new(ctx);
  let (shutdown_tx, shutdown_rx) = shutdown_channel();
  api::daemon::register(&mut module, shutdown_tx.clone());
  api::entities::register(&mut module);
  api::links::register(&mut module);
  api::actions::register(&mut module);
  api::workspaces::register(&mut module);
  api::events::register(&mut module);

  // Before serving, bring persisted workspaces back in line with disk.
  workspaces.reconcile().await;
  let sweeper = workspaces.start_sweeper();

  let (task, server_handle) = start_server(&socket_path, module, shutdown_rx)?;

  Ok(DaemonHandle {
    task,
    sweeper,
    socket_path,
    _server_handle: server_handle,
  })
}
