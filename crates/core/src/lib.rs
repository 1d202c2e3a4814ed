//! Core library for the centy daemon.
//!
//! Owns the durable entity store (projects, issues, pull requests, docs),
//! the bidirectional link graph layered on top of it, the pure action
//! resolver, and the git-worktree-backed workspace manager. Everything is
//! exposed to TUI/CLI clients as JSON-RPC over a Unix domain socket with a
//! cursor-based change-notification stream so connected clients converge
//! without polling the stores.
//!
//! Quick start:
//! - Build a context with `daemon::CentyContext::init(data_root, socket_path, config)`.
//! - Serve it with `daemon::start(ctx)`.
//! - Follow mutations through `events.next { after_seq }`.

pub mod actions;
pub mod adapters;
pub mod config;
pub mod daemon;
pub mod domain;
pub mod error;
pub mod events;
pub mod logging;
pub mod rpc;
pub mod store;
pub mod workspace;
