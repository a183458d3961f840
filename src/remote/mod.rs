//! Remote repository contract and wire types.
//!
//! The remote system of record is a black box behind this trait: anything
//! offering item CRUD, blob storage with overwrite semantics, and
//! idempotent inspection resolution will do.

pub mod http;
#[cfg(test)]
pub mod mock;

use serde::{Deserialize, Serialize};

use crate::model::{Inspection, ItemStatus};

pub use http::HttpRemoteRepository;

/// Upsert payload for one item. `id` is present only when the remote store
/// has already assigned one, which turns the call into an in-place update
/// and keeps repeated pushes idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertItem {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  pub inspection_id: Option<String>,
  pub environment_id: String,
  pub category_name: String,
  pub checklist_item_id: String,
  pub item_number: u32,
  pub description: String,
  pub internal_note: String,
  pub status: ItemStatus,
  /// Remote photo URLs only; local references never leave the device
  pub photo_urls: Vec<String>,
}

/// An item as stored by the remote repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredItem {
  pub id: String,
  pub inspection_id: Option<String>,
  pub environment_id: String,
  pub category_name: String,
  pub checklist_item_id: String,
  pub item_number: u32,
  pub description: String,
  pub internal_note: String,
  pub status: ItemStatus,
  pub photo_urls: Vec<String>,
}

/// Asynchronous CRUD + blob storage against the system of record.
///
/// Implementations are cheap to clone (shared inner client) so the
/// connectivity probe task can hold its own handle.
#[allow(async_fn_in_trait)]
pub trait RemoteRepository: Clone + Send + Sync {
  /// Insert or update one item. Insert when the payload carries no id.
  async fn upsert_item(&self, payload: &UpsertItem) -> color_eyre::Result<StoredItem>;

  /// Delete one item by its remote id.
  async fn delete_item(&self, id: &str) -> color_eyre::Result<()>;

  /// List all items recorded against an inspection.
  async fn list_items(&self, inspection_id: &str) -> color_eyre::Result<Vec<StoredItem>>;

  /// Upload a blob with overwrite-if-exists semantics, so retried uploads
  /// to the same computed path are safe.
  async fn upload_blob(
    &self,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
  ) -> color_eyre::Result<()>;

  /// Public URL for a stored blob path.
  async fn public_url(&self, path: &str) -> color_eyre::Result<String>;

  /// Return the existing inspection for a unit, or create one. Idempotent.
  async fn resolve_or_create_inspection(
    &self,
    unit_id: &str,
    engineer_id: &str,
  ) -> color_eyre::Result<Inspection>;

  /// Cheap reachability check.
  async fn probe(&self) -> bool;
}
