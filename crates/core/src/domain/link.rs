use serde::{Deserialize, Serialize};

use super::entity::EntityId;

/// Typed relation between two entities. Every stored record has a mirror
/// with the inverse kind, so traversal from either end is a plain scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
  Blocks,
  BlockedBy,
  RelatesTo,
}

impl LinkKind {
  pub fn inverse(&self) -> LinkKind {
    match self {
      LinkKind::Blocks => LinkKind::BlockedBy,
      LinkKind::BlockedBy => LinkKind::Blocks,
      LinkKind::RelatesTo => LinkKind::RelatesTo,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      LinkKind::Blocks => "blocks",
      LinkKind::BlockedBy => "blocked_by",
      LinkKind::RelatesTo => "relates_to",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkDirection {
  /// The side the caller created.
  Forward,
  /// The mirrored side maintained by the graph.
  Backward,
}

/// One stored half of a link pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
  pub from: EntityId,
  pub to: EntityId,
  pub kind: LinkKind,
  pub direction: LinkDirection,
}

impl LinkRecord {
  pub fn forward(from: EntityId, to: EntityId, kind: LinkKind) -> Self {
    Self {
      from,
      to,
      kind,
      direction: LinkDirection::Forward,
    }
  }

  /// The mirror record stored alongside this one.
  pub fn mirrored(&self) -> LinkRecord {
    let direction = match self.direction {
      LinkDirection::Forward => LinkDirection::Backward,
      LinkDirection::Backward => LinkDirection::Forward,
    };
    LinkRecord {
      from: self.to,
      to: self.from,
      kind: self.kind.inverse(),
      direction,
    }
  }

  /// Identity of the half-link, ignoring which side the caller created.
  pub fn key(&self) -> (EntityId, EntityId, LinkKind) {
    (self.from, self.to, self.kind)
  }
}

/// Both halves of an atomically written link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPair {
  pub forward: LinkRecord,
  pub inverse: LinkRecord,
}

/// One row of `links_of`: the peer as seen from the queried entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
  pub peer: EntityId,
  pub kind: LinkKind,
  pub direction: LinkDirection,
}
