//! Domain types for inspections and their recorded items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

/// Identity of an inspection item.
///
/// Items start life with a locally-generated id and adopt the remote store's
/// opaque id once the first upsert succeeds. The variant is assigned at
/// creation time so no code has to guess from the shape of the string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ItemId {
  /// Generated on-device before the remote store has seen the record
  Local(String),
  /// Opaque identifier assigned by the remote store
  Remote(String),
}

impl ItemId {
  /// Generate a fresh local id. Millisecond timestamps, bumped past the
  /// previous one so two quick creations in the same process never collide.
  pub fn new_local() -> Self {
    static LAST: AtomicI64 = AtomicI64::new(0);

    let now = Utc::now().timestamp_millis();
    let id = LAST
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
        Some(if now > prev { now } else { prev + 1 })
      })
      .map(|prev| if now > prev { now } else { prev + 1 })
      .unwrap_or(now);

    ItemId::Local(id.to_string())
  }

  /// True once the remote store has assigned this item its identity.
  pub fn is_remote(&self) -> bool {
    matches!(self, ItemId::Remote(_))
  }

  pub fn as_str(&self) -> &str {
    match self {
      ItemId::Local(s) | ItemId::Remote(s) => s,
    }
  }
}

impl std::fmt::Display for ItemId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A photo attached to an item: either a reference the device can read
/// (file path, `file://` URI, `data:` URL) or a public URL in blob storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum PhotoRef {
  Local(String),
  Remote(String),
}

impl PhotoRef {
  pub fn is_remote(&self) -> bool {
    matches!(self, PhotoRef::Remote(_))
  }

  pub fn as_str(&self) -> &str {
    match self {
      PhotoRef::Local(s) | PhotoRef::Remote(s) => s,
    }
  }
}

/// Item status, meaningful for re-inspection workflows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
  #[default]
  Pending,
  Resolved,
}

/// One recorded defect/observation ("apontamento").
///
/// Classification fields are denormalized at creation time so the cached
/// list is self-describing without taxonomy lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionItem {
  pub id: ItemId,
  /// Owning inspection; none while the inspection has not been created remotely
  pub inspection_id: Option<String>,
  pub environment_id: String,
  pub category_name: String,
  pub checklist_item_id: String,
  pub item_number: u32,
  pub description: String,
  pub internal_note: String,
  pub status: ItemStatus,
  pub photo_refs: Vec<PhotoRef>,
  /// True iff the last known local state is durably confirmed remote
  pub synced: bool,
}

impl InspectionItem {
  /// Create a new unsynced item with a fresh local id.
  pub fn new(
    inspection_id: Option<String>,
    environment_id: String,
    category_name: String,
    checklist_item_id: String,
    item_number: u32,
    description: String,
  ) -> Self {
    Self {
      id: ItemId::new_local(),
      inspection_id,
      environment_id,
      category_name,
      checklist_item_id,
      item_number,
      description,
      internal_note: String::new(),
      status: ItemStatus::Pending,
      photo_refs: Vec::new(),
      synced: false,
    }
  }
}

/// One visit's worth of recorded items against a unit ("vistoria").
/// Materialized remotely; this is the shape the repository replies with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
  pub id: String,
  pub unit_id: String,
  pub engineer_id: String,
  pub created_at: DateTime<Utc>,
}

/// Next item number for a list: max seen + 1. Uniqueness is intent, not
/// enforced; a collision after concurrent offline edits is tolerated.
pub fn next_item_number(items: &[InspectionItem]) -> u32 {
  items.iter().map(|i| i.item_number).max().unwrap_or(0) + 1
}
