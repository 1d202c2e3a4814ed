//! Layered configuration: built-in defaults overridden by the global
//! `~/.config/centy/config.toml`. Environment variables only relocate
//! runtime paths (socket, data root), never tune behavior.

mod defaults;
mod load;
mod paths;
mod types;
mod validate;

pub use load::load;
pub use paths::{global_config_path, resolve_data_root, resolve_socket_path};
pub use types::{Config, ConfigError, EditorConfig, LogLevel, Result};
