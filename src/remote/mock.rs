//! Scripted in-memory remote repository for tests.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::model::Inspection;

use super::{RemoteRepository, StoredItem, UpsertItem};

#[derive(Default)]
struct MockState {
  items: Vec<StoredItem>,
  inspections: HashMap<String, Inspection>,
  blobs: HashMap<String, String>,
  next_id: u32,

  upsert_calls: Vec<UpsertItem>,
  delete_calls: Vec<String>,
  upload_calls: Vec<String>,

  offline: bool,
  fail_delete_ids: Vec<String>,
  /// Fail any blob upload whose path contains this substring
  fail_uploads_containing: Option<String>,
  /// Fail any upsert whose description contains this substring
  fail_upserts_containing: Option<String>,
}

/// In-memory remote with per-call failure injection and call recording.
#[derive(Clone, Default)]
pub struct MockRemote {
  state: Arc<Mutex<MockState>>,
}

impl MockRemote {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set_offline(&self, offline: bool) {
    self.state.lock().unwrap().offline = offline;
  }

  pub fn fail_delete(&self, id: &str) {
    self.state.lock().unwrap().fail_delete_ids.push(id.to_string());
  }

  pub fn clear_delete_failures(&self) {
    self.state.lock().unwrap().fail_delete_ids.clear();
  }

  pub fn fail_uploads_containing(&self, fragment: &str) {
    self.state.lock().unwrap().fail_uploads_containing = Some(fragment.to_string());
  }

  pub fn fail_upserts_containing(&self, fragment: &str) {
    self.state.lock().unwrap().fail_upserts_containing = Some(fragment.to_string());
  }

  pub fn clear_failures(&self) {
    let mut state = self.state.lock().unwrap();
    state.fail_delete_ids.clear();
    state.fail_uploads_containing = None;
    state.fail_upserts_containing = None;
  }

  pub fn seed_item(&self, item: StoredItem) {
    self.state.lock().unwrap().items.push(item);
  }

  pub fn items(&self) -> Vec<StoredItem> {
    self.state.lock().unwrap().items.clone()
  }

  pub fn upsert_calls(&self) -> Vec<UpsertItem> {
    self.state.lock().unwrap().upsert_calls.clone()
  }

  pub fn delete_calls(&self) -> Vec<String> {
    self.state.lock().unwrap().delete_calls.clone()
  }

  pub fn upload_calls(&self) -> Vec<String> {
    self.state.lock().unwrap().upload_calls.clone()
  }

  pub fn blob_content_type(&self, path: &str) -> Option<String> {
    self.state.lock().unwrap().blobs.get(path).cloned()
  }
}

impl RemoteRepository for MockRemote {
  async fn upsert_item(&self, payload: &UpsertItem) -> Result<StoredItem> {
    let mut state = self.state.lock().unwrap();
    if state.offline {
      return Err(eyre!("network unreachable"));
    }
    state.upsert_calls.push(payload.clone());

    if let Some(fragment) = &state.fail_upserts_containing {
      if payload.description.contains(fragment.as_str()) {
        return Err(eyre!("remote rejected upsert"));
      }
    }

    let id = match &payload.id {
      Some(id) => id.clone(),
      None => {
        state.next_id += 1;
        format!("srv-{:08x}{:08x}", state.next_id, state.next_id * 7919)
      }
    };

    let stored = StoredItem {
      id: id.clone(),
      inspection_id: payload.inspection_id.clone(),
      environment_id: payload.environment_id.clone(),
      category_name: payload.category_name.clone(),
      checklist_item_id: payload.checklist_item_id.clone(),
      item_number: payload.item_number,
      description: payload.description.clone(),
      internal_note: payload.internal_note.clone(),
      status: payload.status,
      photo_urls: payload.photo_urls.clone(),
    };

    match state.items.iter_mut().find(|i| i.id == id) {
      Some(existing) => *existing = stored.clone(),
      None => state.items.push(stored.clone()),
    }

    Ok(stored)
  }

  async fn delete_item(&self, id: &str) -> Result<()> {
    let mut state = self.state.lock().unwrap();
    if state.offline {
      return Err(eyre!("network unreachable"));
    }
    state.delete_calls.push(id.to_string());

    if state.fail_delete_ids.iter().any(|f| f == id) {
      return Err(eyre!("remote rejected delete"));
    }

    state.items.retain(|i| i.id != id);
    Ok(())
  }

  async fn list_items(&self, inspection_id: &str) -> Result<Vec<StoredItem>> {
    let state = self.state.lock().unwrap();
    if state.offline {
      return Err(eyre!("network unreachable"));
    }

    Ok(
      state
        .items
        .iter()
        .filter(|i| i.inspection_id.as_deref() == Some(inspection_id))
        .cloned()
        .collect(),
    )
  }

  async fn upload_blob(&self, path: &str, _bytes: Vec<u8>, content_type: &str) -> Result<()> {
    let mut state = self.state.lock().unwrap();
    if state.offline {
      return Err(eyre!("network unreachable"));
    }
    state.upload_calls.push(path.to_string());

    if let Some(fragment) = &state.fail_uploads_containing {
      if path.contains(fragment.as_str()) {
        return Err(eyre!("blob upload failed"));
      }
    }

    state.blobs.insert(path.to_string(), content_type.to_string());
    Ok(())
  }

  async fn public_url(&self, path: &str) -> Result<String> {
    if self.state.lock().unwrap().offline {
      return Err(eyre!("network unreachable"));
    }
    Ok(format!("https://blobs.example/{}", path))
  }

  async fn resolve_or_create_inspection(
    &self,
    unit_id: &str,
    engineer_id: &str,
  ) -> Result<Inspection> {
    let mut state = self.state.lock().unwrap();
    if state.offline {
      return Err(eyre!("network unreachable"));
    }

    if let Some(inspection) = state.inspections.get(unit_id) {
      return Ok(inspection.clone());
    }

    state.next_id += 1;
    let inspection = Inspection {
      id: format!("insp-{:08x}", state.next_id),
      unit_id: unit_id.to_string(),
      engineer_id: engineer_id.to_string(),
      created_at: Utc::now(),
    };
    state
      .inspections
      .insert(unit_id.to_string(), inspection.clone());
    Ok(inspection)
  }

  async fn probe(&self) -> bool {
    !self.state.lock().unwrap().offline
  }
}
