//! Durable record of entities and links: the single source of truth.
//!
//! The whole store is one JSON document guarded by a read/write lock and
//! persisted atomically, which is what gives link pairs their multi-record
//! atomicity. Critical sections are narrow; cross-request consistency comes
//! from the optimistic version counter on every entity, not from held locks.

mod entity_store;
mod link_graph;
mod persist;

pub use entity_store::{ListFilter, SortDirection, SortField, SortSpec};
pub use persist::StateFile;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::domain::entity::{Entity, EntityId, EntityKind};
use crate::domain::link::LinkRecord;
use crate::error::CoreError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoreState {
  #[serde(default)]
  pub entities: HashMap<EntityId, Entity>,
  /// Next display number per `{project}:{kind}`. Counters only move
  /// forward, so numbers are never reused even after deletion.
  #[serde(default)]
  pub counters: HashMap<String, u32>,
  #[serde(default)]
  pub links: Vec<LinkRecord>,
}

pub(crate) fn counter_key(project: EntityId, kind: EntityKind) -> String {
  format!("{}:{}", project, kind.label())
}

pub struct Store {
  pub(crate) state: RwLock<StoreState>,
  file: StateFile,
}

impl Store {
  /// Open (or create) the store backed by the given state file.
  pub fn open(path: PathBuf) -> io::Result<Store> {
    let file = StateFile::new(path);
    let state: StoreState = file.load()?;
    Ok(Store {
      state: RwLock::new(state),
      file,
    })
  }

  /// Persist the given state snapshot. Callers hold the write lock and roll
  /// their in-memory changes back when this fails, so no reader ever
  /// observes state that did not reach disk.
  pub(crate) fn persist(&self, state: &StoreState) -> Result<(), CoreError> {
    self
      .file
      .save(state)
      .map_err(|e| CoreError::Internal(format!("persist store state: {e}")))
  }
}
