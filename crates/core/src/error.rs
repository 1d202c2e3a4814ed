use thiserror::Error;

/// Error kinds shared by the stores, the workspace manager, and the service
/// layer. Each kind maps to a stable JSON-RPC error code.
#[derive(Debug, Error)]
pub enum CoreError {
  #[error("not found: {0}")]
  NotFound(String),
  #[error("validation: {0}")]
  Validation(String),
  #[error("conflict: {0}")]
  Conflict(String),
  #[error("invalid state: {0}")]
  InvalidState(String),
  #[error("resource conflict: {0}")]
  ResourceConflict(String),
  #[error("resource limit: {0}")]
  ResourceLimit(String),
  #[error("editor unavailable: {0}")]
  EditorUnavailable(String),
  #[error("internal: {0}")]
  Internal(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
  pub fn rpc_code(&self) -> i32 {
    match self {
      CoreError::Internal(_) => -32000,
      CoreError::Validation(_) => -32001,
      CoreError::NotFound(_) => -32002,
      CoreError::Conflict(_) => -32003,
      CoreError::InvalidState(_) => -32004,
      CoreError::ResourceConflict(_) => -32005,
      CoreError::ResourceLimit(_) => -32006,
      CoreError::EditorUnavailable(_) => -32007,
    }
  }
}

impl From<std::io::Error> for CoreError {
  fn from(e: std::io::Error) -> Self {
    CoreError::Internal(e.to_string())
  }
}
