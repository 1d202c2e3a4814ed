use tracing::info;

use crate::domain::entity::EntityId;
use crate::domain::link::{LinkEntry, LinkKind, LinkPair, LinkRecord};
use crate::error::{CoreError, Result};

use super::Store;

impl Store {
  /// Add a typed link between two entities. The forward and inverse records
  /// are written in one critical section; if the persist step fails both
  /// in-memory writes are rolled back, so no reader ever observes a
  /// half-created link. Adding an existing link returns the stored pair
  /// unchanged so client retries are safe.
  pub fn add_link(&self, from: EntityId, to: EntityId, kind: LinkKind) -> Result<LinkPair> {
    if from == to {
      return Err(CoreError::Validation(format!(
        "cannot link {from} to itself"
      )));
    }
    let mut state = self.state.write().expect("store lock poisoned");
    for id in [from, to] {
      match state.entities.get(&id) {
        Some(e) if !e.removed => {}
        _ => return Err(CoreError::NotFound(format!("entity {id}"))),
      }
    }

    let forward = LinkRecord::forward(from, to, kind);
    let inverse = forward.mirrored();
    if let Some(existing) = state.links.iter().find(|l| l.key() == forward.key()) {
      let pair = LinkPair {
        forward: *existing,
        inverse: existing.mirrored(),
      };
      return Ok(pair);
    }

    state.links.push(forward);
    state.links.push(inverse);
    if let Err(e) = self.persist(&state) {
      state.links.pop();
      state.links.pop();
      return Err(e);
    }

    info!(
      event = "link_added",
      from = %from,
      to = %to,
      kind = kind.as_str(),
      "link pair written"
    );
    Ok(LinkPair { forward, inverse })
  }

  /// Remove a link and its mirror. Accepts either half of the pair.
  pub fn remove_link(&self, from: EntityId, to: EntityId, kind: LinkKind) -> Result<()> {
    let mut state = self.state.write().expect("store lock poisoned");
    let key = (from, to, kind);
    let mirror_key = (to, from, kind.inverse());
    let idx = state
      .links
      .iter()
      .position(|l| l.key() == key)
      .ok_or_else(|| {
        CoreError::NotFound(format!("link {from} -{}-> {to}", kind.as_str()))
      })?;
    let removed = state.links.remove(idx);
    let mirror_idx = state.links.iter().position(|l| l.key() == mirror_key);
    let removed_mirror = mirror_idx.map(|i| state.links.remove(i));

    if let Err(e) = self.persist(&state) {
      state.links.push(removed);
      if let Some(m) = removed_mirror {
        state.links.push(m);
      }
      return Err(e);
    }

    info!(
      event = "link_removed",
      from = %from,
      to = %to,
      kind = kind.as_str(),
      "link pair removed"
    );
    Ok(())
  }

  /// All links touching the entity, as `(peer, kind, direction)` rows.
  pub fn links_of(&self, id: EntityId) -> Result<Vec<LinkEntry>> {
    let state = self.state.read().expect("store lock poisoned");
    if !state.entities.contains_key(&id) {
      return Err(CoreError::NotFound(format!("entity {id}")));
    }
    Ok(
      state
        .links
        .iter()
        .filter(|l| l.from == id)
        .map(|l| LinkEntry {
          peer: l.to,
          kind: l.kind,
          direction: l.direction,
        })
        .collect(),
    )
  }

  pub fn link_count(&self, id: EntityId) -> usize {
    let state = self.state.read().expect("store lock poisoned");
    state.links.iter().filter(|l| l.from == id).count()
  }
}
