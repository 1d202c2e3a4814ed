use anyhow::Context as _;
use tracing::info;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
  let config = centy_core::config::load().context("load configuration")?;
  let data_root = centy_core::config::resolve_data_root().context("resolve data root")?;
  let socket_path = centy_core::config::resolve_socket_path().context("resolve socket path")?;

  // Initialize structured logging early
  let log_path = centy_core::adapters::fs::logs_path(&data_root);
  centy_core::logging::init(&log_path, config.log_level);

  let ctx = centy_core::daemon::CentyContext::init(&data_root, &socket_path, config)
    .context("initialize daemon state")?;
  let mut handle = centy_core::daemon::start(ctx).await.context("start daemon")?;
  info!(event = "centyd_running", socket = %socket_path.display(), "daemon is serving");

  // Exit on Ctrl-C or when an RPC shutdown stops the accept loop.
  tokio::select! {
    _ = tokio::signal::ctrl_c() => {
      info!(event = "centyd_interrupted", "shutting down");
    }
    _ = handle.wait() => {
      info!(event = "centyd_stopped", "server exited");
    }
  }
  handle.stop();
  Ok(())
}
