//! Inspection session: the surface the UI layer talks to.
//!
//! Owns the in-memory item list for one unit. Every mutation persists to the
//! local cache before any network attempt, so nothing the engineer records
//! depends on connectivity. Sync runs through the coordinator; identity
//! resolution and cache migration happen here, exactly once, when the
//! inspection id transitions from unknown to known.

use color_eyre::{eyre::eyre, Result};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::cache::{migrate, CacheKey, KvStore, LocalCacheStore};
use crate::model::{next_item_number, InspectionItem, ItemId};
use crate::remote::RemoteRepository;
use crate::sync::client::stored_to_item;
use crate::sync::SyncCoordinator;

pub struct Session<R: RemoteRepository, K: KvStore> {
  unit_id: String,
  engineer_id: String,
  inspection_id: Option<String>,
  key: CacheKey,
  store: LocalCacheStore<K>,
  remote: R,
  coordinator: SyncCoordinator<R, K>,
  items: Vec<InspectionItem>,
  online: bool,
}

impl<R: RemoteRepository, K: KvStore> Session<R, K> {
  /// Open a session for a unit.
  ///
  /// Online: resolve or create the inspection remotely, migrate any
  /// unit-keyed cache, then reconcile the backlog. Offline: fall back to
  /// the last inspection id cached for the unit, or defer identity entirely
  /// and work under the unit key.
  pub async fn open(
    unit_id: &str,
    engineer_id: &str,
    store: LocalCacheStore<K>,
    remote: R,
    online: bool,
  ) -> Result<Self> {
    let coordinator = SyncCoordinator::new(remote.clone(), store.clone());

    let mut session = Self {
      unit_id: unit_id.to_string(),
      engineer_id: engineer_id.to_string(),
      inspection_id: None,
      key: CacheKey::resolve(None, unit_id),
      store,
      remote,
      coordinator,
      items: Vec::new(),
      online,
    };

    if online {
      session.resolve_identity().await?;
    } else if let Some(id) = session.store.last_inspection_id(unit_id)? {
      session.bind_identity(id)?;
    }

    session.items = session.store.load(&session.key)?.unwrap_or_default();

    if online {
      session.sync_now().await?;
      session.refresh().await?;
    }

    Ok(session)
  }

  /// Resolve the inspection identity against the remote store. A failure
  /// here degrades to the offline path; it never blocks the session.
  async fn resolve_identity(&mut self) -> Result<()> {
    if self.inspection_id.is_some() {
      return Ok(());
    }

    match self
      .remote
      .resolve_or_create_inspection(&self.unit_id, &self.engineer_id)
      .await
    {
      Ok(inspection) => {
        info!(
          "Unit {} resolved to inspection {} (created {})",
          self.unit_id, inspection.id, inspection.created_at
        );
        self.store.remember_inspection_id(&self.unit_id, &inspection.id)?;
        self.bind_identity(inspection.id)?;
      }
      Err(e) => {
        warn!("Could not resolve inspection for unit {}: {}", self.unit_id, e);
        if let Some(id) = self.store.last_inspection_id(&self.unit_id)? {
          self.bind_identity(id)?;
        }
      }
    }

    Ok(())
  }

  /// Rebind the cache to the inspection key, folding in anything recorded
  /// under the unit key. Runs before any sync against the new key.
  fn bind_identity(&mut self, inspection_id: String) -> Result<()> {
    let new_key = CacheKey::resolve(Some(&inspection_id), &self.unit_id);
    let old_key = CacheKey::resolve(None, &self.unit_id);

    migrate::migrate(&self.store, &old_key, &new_key)?;

    info!("Session for unit {} bound to {}", self.unit_id, new_key.description());
    self.inspection_id = Some(inspection_id);
    self.key = new_key;
    self.items = self.store.load(&self.key)?.unwrap_or_default();

    Ok(())
  }

  /// Record or replace one item. The cache write happens before any network
  /// attempt; if currently online, the coordinator is invoked for this item.
  pub async fn add_or_update_item(&mut self, mut item: InspectionItem) -> Result<()> {
    if item.inspection_id.is_none() {
      item.inspection_id = self.inspection_id.clone();
    }
    // Any local change means the remote copy is stale again
    item.synced = false;

    let id = item.id.clone();
    match self.items.iter().position(|i| i.id == id) {
      Some(pos) => self.items[pos] = item,
      None => self.items.push(item),
    }

    self.store.save(&self.key, &self.items)?;

    if self.online {
      self
        .coordinator
        .sync_item(&self.key, &mut self.items, &id)
        .await?;
    }

    Ok(())
  }

  /// Delete one item. The visible removal is immediate and durable; a
  /// remote copy is deleted inline when online, otherwise (or on failure)
  /// its id joins the pending-delete set for the next cycle.
  pub async fn delete_item(&mut self, id: &ItemId) -> Result<()> {
    let pos = self
      .items
      .iter()
      .position(|i| &i.id == id)
      .ok_or_else(|| eyre!("No item with id {}", id))?;
    let removed = self.items.remove(pos);

    self.store.save(&self.key, &self.items)?;

    if let ItemId::Remote(remote_id) = &removed.id {
      if self.online {
        match self.coordinator.client().delete_item(remote_id).await {
          Ok(()) => return Ok(()),
          Err(e) => warn!("Inline delete of {} failed, deferring: {}", remote_id, e),
        }
      }

      let mut pending = self.store.load_deletes(&self.key)?;
      if !pending.iter().any(|p| p == remote_id) {
        pending.push(remote_id.clone());
      }
      self.store.save_deletes(&self.key, &pending)?;
    }

    Ok(())
  }

  /// Reconnect handler: resolve identity if still unknown, then reconcile
  /// the whole backlog and refresh from the remote list.
  pub async fn on_reconnect(&mut self) -> Result<()> {
    self.online = true;
    self.resolve_identity().await?;
    self.sync_now().await?;
    self.refresh().await
  }

  pub fn went_offline(&mut self) {
    self.online = false;
  }

  /// Run a full sync cycle for the backlog.
  pub async fn sync_now(&mut self) -> Result<()> {
    if !self.online {
      return Ok(());
    }
    self.coordinator.sync_all(&self.key, &mut self.items).await
  }

  /// Refresh the list from the remote store. Remote records win for their
  /// ids; records with outstanding local changes survive; ids pending
  /// deletion are filtered out. Offline this is a no-op (cache-first).
  pub async fn refresh(&mut self) -> Result<()> {
    if !self.online {
      return Ok(());
    }
    let Some(inspection_id) = self.inspection_id.clone() else {
      return Ok(());
    };

    let stored = match self.remote.list_items(&inspection_id).await {
      Ok(stored) => stored,
      Err(e) => {
        warn!("Refresh for {} failed, keeping cache: {}", inspection_id, e);
        return Ok(());
      }
    };

    let pending: HashSet<String> = self.store.load_deletes(&self.key)?.into_iter().collect();

    let mut merged: Vec<InspectionItem> = stored
      .into_iter()
      .filter(|s| !pending.contains(&s.id))
      .map(stored_to_item)
      .collect();

    for local in &self.items {
      if local.synced {
        continue;
      }
      match merged.iter_mut().find(|m| m.id == local.id) {
        Some(slot) => *slot = local.clone(),
        None => merged.push(local.clone()),
      }
    }

    self.items = merged;
    self.store.save(&self.key, &self.items)
  }

  pub fn items(&self) -> &[InspectionItem] {
    &self.items
  }

  /// Look up a full item id from its raw string form (as typed on the CLI).
  pub fn find_id(&self, raw: &str) -> Option<ItemId> {
    self
      .items
      .iter()
      .find(|i| i.id.as_str() == raw)
      .map(|i| i.id.clone())
  }

  pub fn next_item_number(&self) -> u32 {
    next_item_number(&self.items)
  }

  pub fn is_online(&self) -> bool {
    self.online
  }

  pub fn is_syncing(&self) -> bool {
    self.coordinator.is_syncing()
  }

  pub fn inspection_id(&self) -> Option<&str> {
    self.inspection_id.as_deref()
  }

  pub fn cache_key(&self) -> &CacheKey {
    &self.key
  }

  /// Count of items awaiting a successful push.
  pub fn unsynced_count(&self) -> usize {
    self.items.iter().filter(|i| !i.synced).count()
  }

  /// Count of deletions awaiting remote confirmation.
  pub fn pending_delete_count(&self) -> Result<usize> {
    Ok(self.store.load_deletes(&self.key)?.len())
  }
}
