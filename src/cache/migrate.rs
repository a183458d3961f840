//! Cache migration from the unit-scoped key to the inspection-scoped key.

use color_eyre::Result;
use std::collections::HashSet;
use tracing::info;

use super::key::CacheKey;
use super::kv::KvStore;
use super::store::LocalCacheStore;

/// Fold the cache under `old` into the cache under `new`.
///
/// Items already present under `new` (by id) are kept as-is; items only
/// under `old` are appended, re-stamped with the new inspection id if they
/// have none. Pending deletions are carried over the same way. The old keys
/// are removed afterwards, which makes a second run a no-op.
///
/// Must run to completion before the first sync attempt against `new`.
pub fn migrate<K: KvStore>(
  store: &LocalCacheStore<K>,
  old: &CacheKey,
  new: &CacheKey,
) -> Result<usize> {
  if old == new {
    return Ok(0);
  }

  let inspection_id = match new {
    CacheKey::Inspection { inspection_id } => Some(inspection_id.clone()),
    CacheKey::Unit { .. } => None,
  };

  let mut migrated = 0;

  if let Some(old_items) = store.load(old)? {
    let mut merged = store.load(new)?.unwrap_or_default();
    let present: HashSet<String> = merged.iter().map(|i| i.id.as_str().to_string()).collect();

    for mut item in old_items {
      if present.contains(item.id.as_str()) {
        continue;
      }
      if item.inspection_id.is_none() {
        item.inspection_id = inspection_id.clone();
      }
      merged.push(item);
      migrated += 1;
    }

    store.save(new, &merged)?;
    store.remove(old)?;
  }

  let old_deletes = store.load_deletes(old)?;
  if !old_deletes.is_empty() {
    let mut deletes = store.load_deletes(new)?;
    for id in old_deletes {
      if !deletes.contains(&id) {
        deletes.push(id);
      }
    }
    store.save_deletes(new, &deletes)?;
    store.save_deletes(old, &[])?;
  }

  if migrated > 0 {
    info!(
      "Migrated {} cached item(s) from {} to {}",
      migrated,
      old.description(),
      new.description()
    );
  }

  Ok(migrated)
}
