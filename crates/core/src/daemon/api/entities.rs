use jsonrpsee::core::RpcResult;
use jsonrpsee::server::RpcModule;
use tracing::info;

use crate::daemon::CentyContext;
use crate::domain::entity::Entity;
use crate::events::{EntityChange, Event};
use crate::rpc::{
  EntityArchiveParams, EntityCreateParams, EntityGetParams, EntityListParams,
  EntityListResponse, EntityUpdateParams,
};

use super::rpc_err;

fn publish(ctx: &CentyContext, entity: &Entity, change: EntityChange) {
  ctx.events.publish(Event::EntityChanged {
    id: entity.id,
    kind: entity.kind(),
    change,
    version: entity.version,
  });
}

/// Register entity CRUD APIs: create, get, update, list, archive, remove,
/// restore.
pub fn register(module: &mut RpcModule<CentyContext>) {
  module
    .register_method(
      "entity.create",
      |params, ctx: &CentyContext, _ext| -> RpcResult<serde_json::Value> {
        let p: EntityCreateParams = params.parse()?;
        let entity = ctx.store.create(p).map_err(rpc_err)?;
        publish(ctx, &entity, EntityChange::Created);
        info!(event = "entity_create_served", id = %entity.id, kind = entity.kind().label(), "entity created");
        Ok(serde_json::json!(entity))
      },
    )
    .expect("register entity.create");

  module
    .register_method(
      "entity.get",
      |params, ctx: &CentyContext, _ext| -> RpcResult<serde_json::Value> {
        let p: EntityGetParams = params.parse()?;
        let entity = ctx.store.get(p.id).map_err(rpc_err)?;
        Ok(serde_json::json!(entity))
      },
    )
    .expect("register entity.get");

  module
    .register_method(
      "entity.update",
      |params, ctx: &CentyContext, _ext| -> RpcResult<serde_json::Value> {
        let p: EntityUpdateParams = params.parse()?;
        let entity = ctx
          .store
          .update(p.id, p.expected_version, p.patch)
          .map_err(rpc_err)?;
        publish(ctx, &entity, EntityChange::Updated);
        Ok(serde_json::json!(entity))
      },
    )
    .expect("register entity.update");

  module
    .register_method(
      "entity.list",
      |params, ctx: &CentyContext, _ext| -> RpcResult<serde_json::Value> {
        let p: EntityListParams = params.parse()?;
        let entities = ctx
          .store
          .list(p.kind, &p.filter, &p.sort.unwrap_or_default());
        Ok(serde_json::json!(EntityListResponse { entities }))
      },
    )
    .expect("register entity.list");

  module
    .register_method(
      "entity.archive",
      |params, ctx: &CentyContext, _ext| -> RpcResult<serde_json::Value> {
        let p: EntityArchiveParams = params.parse()?;
        let entity = ctx.store.set_archived(p.id, p.archived).map_err(rpc_err)?;
        let change = if p.archived {
          EntityChange::Archived
        } else {
          EntityChange::Unarchived
        };
        publish(ctx, &entity, change);
        Ok(serde_json::json!(entity))
      },
    )
    .expect("register entity.archive");

  module
    .register_method(
      "entity.remove",
      |params, ctx: &CentyContext, _ext| -> RpcResult<serde_json::Value> {
        let p: EntityGetParams = params.parse()?;
        let entity = ctx.store.remove(p.id).map_err(rpc_err)?;
        publish(ctx, &entity, EntityChange::Removed);
        info!(event = "entity_remove_served", id = %entity.id, "entity removed");
        Ok(serde_json::json!(entity))
      },
    )
    .expect("register entity.remove");

  module
    .register_method(
      "entity.restore",
      |params, ctx: &CentyContext, _ext| -> RpcResult<serde_json::Value> {
        let p: EntityGetParams = params.parse()?;
        let entity = ctx.store.restore(p.id).map_err(rpc_err)?;
        publish(ctx, &entity, EntityChange::Restored);
        Ok(serde_json::json!(entity))
      },
    )
    .expect("register entity.restore");
}
