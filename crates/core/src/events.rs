//! Push-style change feed. Mutations publish envelopes onto a bounded
//! replay buffer; clients follow the feed with a monotonically increasing
//! cursor and long-poll for anything newer.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::domain::entity::{EntityId, EntityKind};
use crate::domain::link::LinkKind;
use crate::domain::workspace::{WorkspaceId, WorkspaceState};

/// How many envelopes the replay buffer retains. Clients that fall further
/// behind miss events; the cursor still advances past the gap.
const REPLAY_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityChange {
  Created,
  Updated,
  Archived,
  Unarchived,
  Removed,
  Restored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
  EntityChanged {
    id: EntityId,
    kind: EntityKind,
    change: EntityChange,
    version: u64,
  },
  LinkChanged {
    from: EntityId,
    to: EntityId,
    link: LinkKind,
    added: bool,
  },
  WorkspaceChanged {
    id: WorkspaceId,
    entity: Option<EntityId>,
    state: WorkspaceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
  pub seq: u64,
  #[serde(flatten)]
  pub event: Event,
}

pub struct EventBus {
  buffer: Mutex<Buffer>,
  notify: watch::Sender<u64>,
}

struct Buffer {
  entries: VecDeque<EventEnvelope>,
  next_seq: u64,
}

impl Default for EventBus {
  fn default() -> Self {
    Self::new()
  }
}

impl EventBus {
  pub fn new() -> Self {
    let (notify, _) = watch::channel(0);
    Self {
      buffer: Mutex::new(Buffer {
        entries: VecDeque::new(),
        next_seq: 1,
      }),
      notify,
    }
  }

  /// Assign the next sequence number and append to the replay buffer.
  pub fn publish(&self, event: Event) -> u64 {
    let seq = {
      let mut buf = self.buffer.lock().expect("event buffer poisoned");
      let seq = buf.next_seq;
      buf.next_seq += 1;
      buf.entries.push_back(EventEnvelope { seq, event });
      while buf.entries.len() > REPLAY_CAPACITY {
        buf.entries.pop_front();
      }
      seq
    };
    let _ = self.notify.send(seq);
    seq
  }

  /// Envelopes with a sequence number strictly greater than `after_seq`.
  pub fn since(&self, after_seq: u64) -> Vec<EventEnvelope> {
    let buf = self.buffer.lock().expect("event buffer poisoned");
    buf
      .entries
      .iter()
      .filter(|e| e.seq > after_seq)
      .cloned()
      .collect()
  }

  pub fn latest_seq(&self) -> u64 {
    let buf = self.buffer.lock().expect("event buffer poisoned");
    buf.next_seq - 1
  }

  /// Long-poll: return events past the cursor, waiting up to `wait` for the
  /// first one. An empty vec means the wait elapsed with nothing new.
  pub async fn next_after(&self, after_seq: u64, wait: Duration) -> Vec<EventEnvelope> {
    let mut rx = self.notify.subscribe();
    let deadline = tokio::time::Instant::now() + wait;
    loop {
      let pending = self.since(after_seq);
      if !pending.is_empty() {
        return pending;
      }
      match tokio::time::timeout_at(deadline, rx.changed()).await {
        Ok(Ok(())) => continue,
        // Timeout elapsed or the bus was dropped.
        _ => return Vec::new(),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entity_event(version: u64) -> Event {
    Event::EntityChanged {
      id: EntityId::generate(),
      kind: EntityKind::Issue,
      change: EntityChange::Updated,
      version,
    }
  }

  #[test]
  fn sequence_numbers_increase_from_one() {
    let bus = EventBus::new();
    assert_eq!(bus.publish(entity_event(1)), 1);
    assert_eq!(bus.publish(entity_event(2)), 2);
    assert_eq!(bus.latest_seq(), 2);
  }

  #[test]
  fn since_filters_by_cursor() {
    let bus = EventBus::new();
    for v in 1..=5 {
      bus.publish(entity_event(v));
    }
    let after_three = bus.since(3);
    assert_eq!(after_three.len(), 2);
    assert_eq!(after_three[0].seq, 4);
    assert_eq!(after_three[1].seq, 5);
    assert!(bus.since(5).is_empty());
  }

  #[test]
  fn replay_buffer_is_bounded() {
    let bus = EventBus::new();
    for v in 0..(REPLAY_CAPACITY as u64 + 10) {
      bus.publish(entity_event(v));
    }
    let all = bus.since(0);
    assert_eq!(all.len(), REPLAY_CAPACITY);
    // Oldest entries fell off; the newest is still the latest seq.
    assert_eq!(all.last().unwrap().seq, bus.latest_seq());
  }

  #[tokio::test]
  async fn next_after_returns_immediately_when_behind() {
    let bus = EventBus::new();
    bus.publish(entity_event(1));
    let got = bus.next_after(0, Duration::from_secs(5)).await;
    assert_eq!(got.len(), 1);
  }

  #[tokio::test]
  async fn next_after_times_out_empty() {
    let bus = EventBus::new();
    let got = bus.next_after(0, Duration::from_millis(20)).await;
    assert!(got.is_empty());
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn next_after_wakes_on_publish() {
    let bus = std::sync::Arc::new(EventBus::new());
    let waiter = {
      let bus = bus.clone();
      tokio::spawn(async move { bus.next_after(0, Duration::from_secs(5)).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    bus.publish(entity_event(1));
    let got = waiter.await.unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].seq, 1);
  }
}
