//! Durable item-list and pending-delete persistence over the host kv store.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;

use crate::model::InspectionItem;

use super::key::CacheKey;
use super::kv::KvStore;

/// Local cache for inspection items and pending deletions.
///
/// Everything is stored as JSON under the keys derived by [`CacheKey`].
/// An absent key is a valid state (never written), not an error.
pub struct LocalCacheStore<K: KvStore> {
  kv: Arc<K>,
  /// Whether this host can still read local photo references after a
  /// restart. Browser-hosted runtimes cannot, so their caches are
  /// sanitized on write; see [`LocalCacheStore::save`].
  persists_local_blob_refs: bool,
}

impl<K: KvStore> LocalCacheStore<K> {
  pub fn new(kv: K, persists_local_blob_refs: bool) -> Self {
    Self {
      kv: Arc::new(kv),
      persists_local_blob_refs,
    }
  }

  /// Load the item list for a key. `None` means the key was never written.
  pub fn load(&self, key: &CacheKey) -> Result<Option<Vec<InspectionItem>>> {
    match self.kv.get(&key.items_key())? {
      Some(raw) => {
        let items: Vec<InspectionItem> = serde_json::from_str(&raw)
          .map_err(|e| eyre!("Corrupt item cache under {}: {}", key.items_key(), e))?;
        Ok(Some(items))
      }
      None => Ok(None),
    }
  }

  /// Persist the item list for a key.
  ///
  /// On hosts that cannot dereference local photo references across a
  /// restart, any reference that is not a remote URL is stripped before
  /// writing. Deliberately lossy: unsynced local-only photos do not survive
  /// a reload on such hosts, a documented limitation rather than a dangling
  /// reference at load time.
  pub fn save(&self, key: &CacheKey, items: &[InspectionItem]) -> Result<()> {
    let raw = if self.persists_local_blob_refs {
      serde_json::to_string(items)
    } else {
      let sanitized: Vec<InspectionItem> = items
        .iter()
        .cloned()
        .map(|mut item| {
          item.photo_refs.retain(|r| r.is_remote());
          item
        })
        .collect();
      serde_json::to_string(&sanitized)
    }
    .map_err(|e| eyre!("Failed to serialize item cache: {}", e))?;

    self.kv.set(&key.items_key(), &raw)
  }

  /// Delete the item list record for a key entirely.
  pub fn remove(&self, key: &CacheKey) -> Result<()> {
    self.kv.remove(&key.items_key())
  }

  /// Load the pending-delete id set for a key. Absent means empty.
  pub fn load_deletes(&self, key: &CacheKey) -> Result<Vec<String>> {
    match self.kv.get(&key.deletes_key())? {
      Some(raw) => serde_json::from_str(&raw)
        .map_err(|e| eyre!("Corrupt delete set under {}: {}", key.deletes_key(), e)),
      None => Ok(Vec::new()),
    }
  }

  /// Persist the pending-delete id set. An empty set removes the record.
  pub fn save_deletes(&self, key: &CacheKey, ids: &[String]) -> Result<()> {
    if ids.is_empty() {
      return self.kv.remove(&key.deletes_key());
    }

    let raw =
      serde_json::to_string(ids).map_err(|e| eyre!("Failed to serialize delete set: {}", e))?;
    self.kv.set(&key.deletes_key(), &raw)
  }

  /// Last inspection id seen for a unit, for offline identity recovery.
  pub fn last_inspection_id(&self, unit_id: &str) -> Result<Option<String>> {
    self.kv.get(&last_inspection_key(unit_id))
  }

  /// Remember the inspection id resolved for a unit.
  pub fn remember_inspection_id(&self, unit_id: &str, inspection_id: &str) -> Result<()> {
    self.kv.set(&last_inspection_key(unit_id), inspection_id)
  }
}

impl<K: KvStore> Clone for LocalCacheStore<K> {
  fn clone(&self) -> Self {
    Self {
      kv: Arc::clone(&self.kv),
      persists_local_blob_refs: self.persists_local_blob_refs,
    }
  }
}

fn last_inspection_key(unit_id: &str) -> String {
  format!("LAST_INSPECTION_ID_{}", unit_id)
}
