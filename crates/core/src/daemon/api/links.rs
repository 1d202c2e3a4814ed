use jsonrpsee::core::RpcResult;
use jsonrpsee::server::RpcModule;

use crate::daemon::CentyContext;
use crate::events::Event;
use crate::rpc::{EntityGetParams, LinkAddResponse, LinkListResponse, LinkParams};

use super::rpc_err;

/// Register link graph APIs: add, remove, list.
pub fn register(module: &mut RpcModule<CentyContext>) {
  module
    .register_method(
      "link.add",
      |params, ctx: &CentyContext, _ext| -> RpcResult<serde_json::Value> {
        let p: LinkParams = params.parse()?;
        let pair = ctx.store.add_link(p.from, p.to, p.kind).map_err(rpc_err)?;
        ctx.events.publish(Event::LinkChanged {
          from: p.from,
          to: p.to,
          link: p.kind,
          added: true,
        });
        Ok(serde_json::json!(LinkAddResponse {
          forward: pair.forward,
          inverse: pair.inverse,
        }))
      },
    )
    .expect("register link.add");

  module
    .register_method(
      "link.remove",
      |params, ctx: &CentyContext, _ext| -> RpcResult<serde_json::Value> {
        let p: LinkParams = params.parse()?;
        ctx
          .store
          .remove_link(p.from, p.to, p.kind)
          .map_err(rpc_err)?;
        ctx.events.publish(Event::LinkChanged {
          from: p.from,
          to: p.to,
          link: p.kind,
          added: false,
        });
        Ok(serde_json::json!(true))
      },
    )
    .expect("register link.remove");

  module
    .register_method(
      "link.list",
      |params, ctx: &CentyContext, _ext| -> RpcResult<serde_json::Value> {
        let p: EntityGetParams = params.parse()?;
        let links = ctx.store.links_of(p.id).map_err(rpc_err)?;
        Ok(serde_json::json!(LinkListResponse { links }))
      },
    )
    .expect("register link.list");
}
