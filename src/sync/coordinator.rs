//! Sync orchestration: drain pending deletions, then push unsynced items.

use color_eyre::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::cache::{CacheKey, KvStore, LocalCacheStore};
use crate::model::{InspectionItem, ItemId};
use crate::remote::RemoteRepository;

use super::client::SyncClient;

/// Latch ensuring at most one sync pass is active. A trigger arriving while
/// a pass runs queues exactly one full re-run instead of overlapping it.
#[derive(Default)]
pub struct SyncGate {
  state: Mutex<GateState>,
}

#[derive(Default)]
struct GateState {
  running: bool,
  rerun: bool,
}

impl SyncGate {
  /// Try to take the gate. Returns false if a pass is already running, in
  /// which case a re-run has been queued for the holder.
  fn enter(&self) -> bool {
    let mut state = self.state.lock().unwrap();
    if state.running {
      state.rerun = true;
      false
    } else {
      state.running = true;
      true
    }
  }

  /// Finish a pass. Returns true if a queued re-run was consumed; the gate
  /// stays held and the caller runs another pass.
  fn leave(&self) -> bool {
    let mut state = self.state.lock().unwrap();
    if state.rerun {
      state.rerun = false;
      true
    } else {
      state.running = false;
      false
    }
  }

  /// Drop the gate unconditionally, discarding any queued re-run.
  fn release(&self) {
    let mut state = self.state.lock().unwrap();
    state.running = false;
    state.rerun = false;
  }
}

/// Orchestrates sync cycles over the live item list.
///
/// The list is owned by the caller (the session keeps it in memory as the
/// source of truth); the coordinator mutates it in place and persists after
/// every confirmed remote change, so a crash between two items never loses
/// the previous durable state.
pub struct SyncCoordinator<R: RemoteRepository, K: KvStore> {
  client: SyncClient<R>,
  store: LocalCacheStore<K>,
  gate: Arc<SyncGate>,
  syncing: Arc<AtomicBool>,
}

impl<R: RemoteRepository, K: KvStore> SyncCoordinator<R, K> {
  pub fn new(remote: R, store: LocalCacheStore<K>) -> Self {
    Self {
      client: SyncClient::new(remote),
      store,
      gate: Arc::new(SyncGate::default()),
      syncing: Arc::new(AtomicBool::new(false)),
    }
  }

  pub fn client(&self) -> &SyncClient<R> {
    &self.client
  }

  /// Whether a sync pass is currently active.
  pub fn is_syncing(&self) -> bool {
    self.syncing.load(Ordering::SeqCst)
  }

  /// Run a full sync cycle: every pending deletion, every unsynced item.
  pub async fn sync_all(
    &self,
    key: &CacheKey,
    items: &mut Vec<InspectionItem>,
  ) -> Result<()> {
    self.guarded(key, items, None).await
  }

  /// Run a cycle scoped to a single just-mutated item. Pending deletions
  /// are still drained first so a deleted-then-recreated record never races
  /// its own deletion.
  pub async fn sync_item(
    &self,
    key: &CacheKey,
    items: &mut Vec<InspectionItem>,
    id: &ItemId,
  ) -> Result<()> {
    self.guarded(key, items, Some(id.clone())).await
  }

  async fn guarded(
    &self,
    key: &CacheKey,
    items: &mut Vec<InspectionItem>,
    mut only: Option<ItemId>,
  ) -> Result<()> {
    if !self.gate.enter() {
      debug!("Sync already in progress for {}, queued re-run", key.description());
      return Ok(());
    }

    self.syncing.store(true, Ordering::SeqCst);
    let result = loop {
      // Queued re-runs always cover the whole backlog
      let pass = self.run_pass(key, items, only.take()).await;
      if pass.is_err() {
        self.gate.release();
        break pass;
      }
      if !self.gate.leave() {
        break pass;
      }
    };
    self.syncing.store(false, Ordering::SeqCst);

    result
  }

  /// One pass of the cycle. Remote failures are isolated per id/item and
  /// retried on the next cycle; local storage failures propagate.
  async fn run_pass(
    &self,
    key: &CacheKey,
    items: &mut [InspectionItem],
    only: Option<ItemId>,
  ) -> Result<()> {
    debug!("Sync pass for {}", key.description());

    // 1. Drain pending deletions. The set only ever shrinks here.
    let pending = self.store.load_deletes(key)?;
    if !pending.is_empty() {
      let mut remaining = Vec::new();
      for id in pending {
        match self.client.delete_item(&id).await {
          Ok(()) => debug!("Confirmed remote delete of {}", id),
          Err(e) => {
            warn!("Pending delete of {} failed, will retry: {}", id, e);
            remaining.push(id);
          }
        }
      }
      self.store.save_deletes(key, &remaining)?;
    }

    // 2. Push unsynced items, strictly one at a time, in list order.
    for index in 0..items.len() {
      if items[index].synced {
        continue;
      }
      if let Some(only_id) = &only {
        if &items[index].id != only_id {
          continue;
        }
      }

      match self.client.push_item(&items[index], key.owner_scope()).await {
        Ok(updated) => {
          items[index] = updated;
          self.store.save(key, items)?;
        }
        Err(e) => {
          // One item's failure never aborts the batch
          warn!("Sync of item {} failed, will retry: {}", items[index].id, e);
        }
      }
    }

    Ok(())
  }
}

impl<R: RemoteRepository, K: KvStore> Clone for SyncCoordinator<R, K> {
  fn clone(&self) -> Self {
    Self {
      client: self.client.clone(),
      store: self.store.clone(),
      gate: Arc::clone(&self.gate),
      syncing: Arc::clone(&self.syncing),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::kv::MemoryKvStore;
  use crate::remote::mock::MockRemote;

  fn setup() -> (MockRemote, LocalCacheStore<MemoryKvStore>, SyncCoordinator<MockRemote, MemoryKvStore>) {
    let remote = MockRemote::new();
    let store = LocalCacheStore::new(MemoryKvStore::new(), true);
    let coordinator = SyncCoordinator::new(remote.clone(), store.clone());
    (remote, store, coordinator)
  }

  fn unsynced(description: &str) -> InspectionItem {
    InspectionItem::new(
      Some("insp-1".into()),
      "kitchen".into(),
      "Plumbing".into(),
      "chk-1".into(),
      1,
      description.into(),
    )
  }

  #[test]
  fn test_gate_queues_a_single_rerun() {
    let gate = SyncGate::default();

    assert!(gate.enter());
    // Two triggers during the pass collapse into one queued re-run
    assert!(!gate.enter());
    assert!(!gate.enter());

    assert!(gate.leave());
    assert!(!gate.leave());

    // Gate is free again
    assert!(gate.enter());
    gate.release();
  }

  #[tokio::test]
  async fn test_pushes_every_unsynced_item_and_persists() {
    let (remote, store, coordinator) = setup();
    let key = CacheKey::resolve(Some("insp-1"), "U-1");

    let mut items = vec![unsynced("one"), unsynced("two")];
    store.save(&key, &items).unwrap();

    coordinator.sync_all(&key, &mut items).await.unwrap();

    assert!(items.iter().all(|i| i.synced && i.id.is_remote()));
    assert_eq!(remote.items().len(), 2);
    assert_eq!(store.load(&key).unwrap().unwrap(), items);
  }

  #[tokio::test]
  async fn test_one_failing_item_never_aborts_the_batch() {
    let (remote, store, coordinator) = setup();
    remote.fail_upserts_containing("broken");
    let key = CacheKey::resolve(Some("insp-1"), "U-1");

    let mut items = vec![unsynced("ok-1"), unsynced("broken middle"), unsynced("ok-2")];
    store.save(&key, &items).unwrap();

    coordinator.sync_all(&key, &mut items).await.unwrap();

    assert!(items[0].synced);
    assert!(!items[1].synced);
    assert!(items[2].synced);
    // All three were attempted
    assert_eq!(remote.upsert_calls().len(), 3);
    // The durable copy matches memory
    assert_eq!(store.load(&key).unwrap().unwrap(), items);
  }

  #[tokio::test]
  async fn test_failed_deletions_stay_pending() {
    let (remote, store, coordinator) = setup();
    remote.fail_delete("srv-stuck");
    let key = CacheKey::resolve(Some("insp-1"), "U-1");

    store
      .save_deletes(&key, &["srv-gone".to_string(), "srv-stuck".to_string()])
      .unwrap();

    coordinator.sync_all(&key, &mut Vec::new()).await.unwrap();
    assert_eq!(store.load_deletes(&key).unwrap(), vec!["srv-stuck"]);

    // Next cycle drains the rest
    remote.clear_delete_failures();
    coordinator.sync_all(&key, &mut Vec::new()).await.unwrap();
    assert!(store.load_deletes(&key).unwrap().is_empty());
    assert_eq!(remote.delete_calls(), vec!["srv-gone", "srv-stuck", "srv-stuck"]);
  }

  #[tokio::test]
  async fn test_deletions_complete_before_any_push() {
    let (remote, store, coordinator) = setup();
    let key = CacheKey::resolve(Some("insp-1"), "U-1");

    // The same id was deleted and then recreated locally; if the push ran
    // first, the drain would wipe the recreated record.
    store.save_deletes(&key, &["srv-reborn".to_string()]).unwrap();
    let mut item = unsynced("recreated");
    item.id = ItemId::Remote("srv-reborn".into());
    let mut items = vec![item];

    coordinator.sync_all(&key, &mut items).await.unwrap();

    assert!(items[0].synced);
    assert_eq!(remote.items().len(), 1);
    assert_eq!(remote.items()[0].id, "srv-reborn");
  }

  #[tokio::test]
  async fn test_single_item_cycle_still_drains_deletions() {
    let (remote, store, coordinator) = setup();
    let key = CacheKey::resolve(Some("insp-1"), "U-1");

    store.save_deletes(&key, &["srv-old".to_string()]).unwrap();
    let mut items = vec![unsynced("target"), unsynced("bystander")];
    let target = items[0].id.clone();
    store.save(&key, &items).unwrap();

    coordinator.sync_item(&key, &mut items, &target).await.unwrap();

    assert!(items[0].synced);
    assert!(!items[1].synced);
    assert_eq!(remote.delete_calls(), vec!["srv-old"]);
    assert!(store.load_deletes(&key).unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_synced_items_are_not_pushed_again() {
    let (remote, store, coordinator) = setup();
    let key = CacheKey::resolve(Some("insp-1"), "U-1");

    let mut items = vec![unsynced("once")];
    store.save(&key, &items).unwrap();

    coordinator.sync_all(&key, &mut items).await.unwrap();
    coordinator.sync_all(&key, &mut items).await.unwrap();

    assert_eq!(remote.upsert_calls().len(), 1);
    assert_eq!(remote.items().len(), 1);
  }
}
