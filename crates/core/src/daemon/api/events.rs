use std::time::Duration;

use jsonrpsee::core::RpcResult;
use jsonrpsee::server::RpcModule;

use crate::daemon::CentyContext;
use crate::rpc::{EventsNextParams, EventsNextResponse};

/// Default and maximum long-poll wait.
const DEFAULT_WAIT_MS: u64 = 25_000;
const MAX_WAIT_MS: u64 = 60_000;

/// Register events.next: cursor-based long-poll over the change feed.
pub fn register(module: &mut RpcModule<CentyContext>) {
  module
    .register_async_method("events.next", |params, ctx, _ext| async move {
      let p: EventsNextParams = params.parse().unwrap_or_default();
      let wait_ms = p.wait_ms.unwrap_or(DEFAULT_WAIT_MS).min(MAX_WAIT_MS);
      let events = ctx
        .events
        .next_after(p.after_seq, Duration::from_millis(wait_ms))
        .await;
      let resp = EventsNextResponse {
        events,
        latest_seq: ctx.events.latest_seq(),
      };
      RpcResult::Ok(serde_json::json!(resp))
    })
    .expect("register events.next");
}
