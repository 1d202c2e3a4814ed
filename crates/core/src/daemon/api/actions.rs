use jsonrpsee::core::RpcResult;
use jsonrpsee::server::RpcModule;

use crate::actions::{self, ActionState};
use crate::daemon::CentyContext;
use crate::rpc::{ActionsResponse, EntityGetParams};

use super::rpc_err;

/// Register entity.actions: resolve the action list for an entity's
/// current state.
pub fn register(module: &mut RpcModule<CentyContext>) {
  module
    .register_method(
      "entity.actions",
      |params, ctx: &CentyContext, _ext| -> RpcResult<serde_json::Value> {
        let p: EntityGetParams = params.parse()?;
        let entity = ctx.store.get(p.id).map_err(rpc_err)?;
        let state = ActionState {
          status: entity.body.status_str().to_string(),
          archived: entity.body.archived(),
          removed: entity.removed,
          has_active_workspace: ctx.workspaces.active_for_entity(entity.id).is_some(),
          link_count: ctx.store.link_count(entity.id),
        };
        let actions = actions::resolve(entity.kind(), &state);
        Ok(serde_json::json!(ActionsResponse { actions }))
      },
    )
    .expect("register entity.actions");
}
