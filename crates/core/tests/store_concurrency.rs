use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use centy_core::domain::entity::{EntityPatch, NewEntity};
use centy_core::error::CoreError;
use centy_core::store::Store;

fn open_store(td: &tempfile::TempDir) -> Arc<Store> {
  Arc::new(Store::open(td.path().join("entities.json")).unwrap())
}

#[test]
fn concurrent_creates_assign_unique_increasing_numbers() {
  let td = tempfile::tempdir().unwrap();
  let store = open_store(&td);
  let project = store
    .create(NewEntity::Project {
      name: "demo".into(),
      repo_path: "/tmp/demo".into(),
    })
    .unwrap();

  let threads = 8;
  let per_thread = 5;
  let mut handles = Vec::new();
  for t in 0..threads {
    let store = Arc::clone(&store);
    let project_id = project.id;
    handles.push(thread::spawn(move || {
      let mut numbers = Vec::new();
      for i in 0..per_thread {
        let issue = store
          .create(NewEntity::Issue {
            project: project_id,
            title: format!("issue {t}-{i}"),
            description: String::new(),
            priority: 3,
          })
          .unwrap();
        numbers.push(issue.body.display_number().unwrap());
      }
      numbers
    }));
  }

  let mut all: Vec<u32> = handles
    .into_iter()
    .flat_map(|h| h.join().unwrap())
    .collect();
  all.sort_unstable();
  let unique: HashSet<u32> = all.iter().copied().collect();
  assert_eq!(unique.len(), threads * per_thread);
  assert_eq!(*all.first().unwrap(), 1);
  assert_eq!(*all.last().unwrap(), (threads * per_thread) as u32);
}

#[test]
fn concurrent_stale_updates_resolve_to_one_winner() {
  let td = tempfile::tempdir().unwrap();
  let store = open_store(&td);
  let project = store
    .create(NewEntity::Project {
      name: "demo".into(),
      repo_path: "/tmp/demo".into(),
    })
    .unwrap();
  let issue = store
    .create(NewEntity::Issue {
      project: project.id,
      title: "contended".into(),
      description: String::new(),
      priority: 3,
    })
    .unwrap();
  assert_eq!(issue.version, 1);

  let mut handles = Vec::new();
  for t in 0..2 {
    let store = Arc::clone(&store);
    let id = issue.id;
    handles.push(thread::spawn(move || {
      store.update(
        id,
        1,
        EntityPatch {
          title: Some(format!("writer {t}")),
          ..Default::default()
        },
      )
    }));
  }

  let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
  let wins = results.iter().filter(|r| r.is_ok()).count();
  let conflicts = results
    .iter()
    .filter(|r| matches!(r, Err(CoreError::Conflict(_))))
    .count();
  assert_eq!(wins, 1);
  assert_eq!(conflicts, 1);

  let current = store.get(issue.id).unwrap();
  assert_eq!(current.version, 2);
}

#[test]
fn links_survive_reopen_alongside_entities() {
  let td = tempfile::tempdir().unwrap();
  let path = td.path().join("entities.json");
  let (a, b) = {
    let store = Store::open(path.clone()).unwrap();
    let project = store
      .create(NewEntity::Project {
        name: "demo".into(),
        repo_path: "/tmp/demo".into(),
      })
      .unwrap();
    let mk = |title: &str| {
      store
        .create(NewEntity::Issue {
          project: project.id,
          title: title.into(),
          description: String::new(),
          priority: 2,
        })
        .unwrap()
        .id
    };
    let a = mk("a");
    let b = mk("b");
    store
      .add_link(a, b, centy_core::domain::link::LinkKind::Blocks)
      .unwrap();
    (a, b)
  };

  let store = Store::open(path).unwrap();
  let from_a = store.links_of(a).unwrap();
  assert_eq!(from_a.len(), 1);
  assert_eq!(from_a[0].peer, b);
  assert_eq!(store.link_count(b), 1);
}
