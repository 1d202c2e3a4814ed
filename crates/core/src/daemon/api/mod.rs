//! RPC method registration, grouped by surface.

pub mod actions;
pub mod daemon;
pub mod entities;
pub mod events;
pub mod links;
pub mod workspaces;

use jsonrpsee::types::ErrorObjectOwned;

use crate::error::CoreError;

pub(crate) fn rpc_err(e: CoreError) -> ErrorObjectOwned {
  ErrorObjectOwned::owned(e.rpc_code(), e.to_string(), None::<()>)
}
