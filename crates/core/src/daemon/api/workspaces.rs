use jsonrpsee::core::RpcResult;
use jsonrpsee::server::RpcModule;
use tracing::info;

use crate::daemon::CentyContext;
use crate::domain::entity::{Entity, EntityBody, EntityKind};
use crate::error::CoreError;
use crate::rpc::{
  EditorDescriptor, EditorListResponse, WorkspaceExtendTtlParams, WorkspaceListParams,
  WorkspaceListResponse, WorkspaceOpenParams, WorkspaceRefParams,
  WorkspaceResolveConflictParams,
};
use crate::workspace::{OpenRequest, adhoc_workspace_token, entity_workspace_token};

use super::rpc_err;

fn repo_path_of(project: &Entity) -> Result<String, CoreError> {
  match &project.body {
    EntityBody::Project(f) => Ok(f.repo_path.clone()),
    _ => Err(CoreError::Validation(format!(
      "{} is a {}, not a project",
      project.id,
      project.kind().label()
    ))),
  }
}

/// Translate open params into a fully resolved request: bound workspaces
/// derive everything from the entity, standalone ones from the project.
fn build_open_request(ctx: &CentyContext, p: WorkspaceOpenParams) -> Result<OpenRequest, CoreError> {
  if let Some(entity_id) = p.entity {
    let entity = ctx.store.get(entity_id)?;
    if entity.removed {
      return Err(CoreError::InvalidState(format!(
        "entity {entity_id} is removed"
      )));
    }
    let kind = entity.kind();
    if !kind.has_display_number() {
      return Err(CoreError::Validation(format!(
        "workspaces bind to issues or pull requests, not {}",
        kind.label()
      )));
    }
    let display_number = entity
      .body
      .display_number()
      .ok_or_else(|| CoreError::Internal("missing display number".into()))?;
    let project_id = entity
      .body
      .project()
      .ok_or_else(|| CoreError::Internal("missing project reference".into()))?;
    let project = ctx.store.get(project_id)?;
    Ok(OpenRequest {
      entity: Some(entity_id),
      project: project_id,
      repo_path: repo_path_of(&project)?,
      token: entity_workspace_token(kind, display_number, entity.body.title()),
      editor: p.editor,
      ttl_secs: p.ttl_secs,
    })
  } else {
    let project_id = p.project.ok_or_else(|| {
      CoreError::Validation("standalone workspaces require a project".into())
    })?;
    let project = ctx.store.get(project_id)?;
    if project.kind() != EntityKind::Project {
      return Err(CoreError::Validation(format!(
        "{} is not a project",
        project_id
      )));
    }
    if project.removed {
      return Err(CoreError::InvalidState(format!(
        "project {project_id} is removed"
      )));
    }
    Ok(OpenRequest {
      entity: None,
      project: project_id,
      repo_path: repo_path_of(&project)?,
      token: adhoc_workspace_token(crate::domain::workspace::WorkspaceId::generate()),
      editor: p.editor,
      ttl_secs: p.ttl_secs,
    })
  }
}

/// Register workspace lifecycle APIs: open, resolve_conflict, close,
/// extend_ttl, list, editors.
pub fn register(module: &mut RpcModule<CentyContext>) {
  module
    .register_method(
      "workspace.open",
      |params, ctx: &CentyContext, _ext| -> RpcResult<serde_json::Value> {
        let p: WorkspaceOpenParams = params.parse()?;
        let req = build_open_request(ctx, p).map_err(rpc_err)?;
        let ws = ctx.workspaces.open(req).map_err(rpc_err)?;
        info!(event = "workspace_open_served", id = %ws.id, "workspace open accepted");
        Ok(serde_json::json!(ws))
      },
    )
    .expect("register workspace.open");

  module
    .register_method(
      "workspace.resolve_conflict",
      |params, ctx: &CentyContext, _ext| -> RpcResult<serde_json::Value> {
        let p: WorkspaceResolveConflictParams = params.parse()?;
        let ws = ctx
          .workspaces
          .resolve_conflict(p.id, p.decision)
          .map_err(rpc_err)?;
        Ok(serde_json::json!(ws))
      },
    )
    .expect("register workspace.resolve_conflict");

  module
    .register_method(
      "workspace.close",
      |params, ctx: &CentyContext, _ext| -> RpcResult<serde_json::Value> {
        let p: WorkspaceRefParams = params.parse()?;
        let ws = ctx.workspaces.close(p.id).map_err(rpc_err)?;
        Ok(serde_json::json!(ws))
      },
    )
    .expect("register workspace.close");

  module
    .register_method(
      "workspace.extend_ttl",
      |params, ctx: &CentyContext, _ext| -> RpcResult<serde_json::Value> {
        let p: WorkspaceExtendTtlParams = params.parse()?;
        let ws = ctx
          .workspaces
          .extend_ttl(p.id, p.ttl_secs)
          .map_err(rpc_err)?;
        Ok(serde_json::json!(ws))
      },
    )
    .expect("register workspace.extend_ttl");

  module
    .register_method(
      "workspace.list",
      |params, ctx: &CentyContext, _ext| -> RpcResult<serde_json::Value> {
        let p: WorkspaceListParams = params.parse().unwrap_or_default();
        let workspaces = ctx.workspaces.list(p.project);
        Ok(serde_json::json!(WorkspaceListResponse { workspaces }))
      },
    )
    .expect("register workspace.list");

  module
    .register_method(
      "workspace.editors",
      |_params, ctx: &CentyContext, _ext| -> RpcResult<serde_json::Value> {
        let editors: Vec<EditorDescriptor> = ctx
          .config
          .editors
          .iter()
          .map(|(id, cfg)| EditorDescriptor {
            id: id.clone(),
            display_name: cfg.display_name.clone(),
            command: cfg.command.clone(),
            available: ctx.workspaces.probe_editor(&cfg.command),
          })
          .collect();
        Ok(serde_json::json!(EditorListResponse { editors }))
      },
    )
    .expect("register workspace.editors");
}
