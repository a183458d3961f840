//! Per-item remote synchronization: payload building and pushes.

use color_eyre::Result;

use crate::model::{InspectionItem, ItemId, PhotoRef};
use crate::remote::{RemoteRepository, StoredItem, UpsertItem};

use super::photos::upload_photos;

/// Builds upsert payloads and pushes single items against the remote
/// repository. Domain items and wire shapes stay separate; this is the
/// boundary where one becomes the other.
#[derive(Clone)]
pub struct SyncClient<R: RemoteRepository> {
  remote: R,
}

impl<R: RemoteRepository> SyncClient<R> {
  pub fn new(remote: R) -> Self {
    Self { remote }
  }

  /// Push one item: upload its local photos, then upsert the record.
  ///
  /// Returns the item as it should now live in the cache. `synced` is true
  /// only when every photo made it up; a partial photo failure still
  /// upserts the record (with the photos that did succeed) so text edits
  /// are never held hostage by one bad upload.
  pub async fn push_item(
    &self,
    item: &InspectionItem,
    owner_scope: &str,
  ) -> Result<InspectionItem> {
    let photos = upload_photos(&self.remote, &item.id, owner_scope, &item.photo_refs).await;

    let payload = upsert_payload(item, &photos.refs);
    let stored = self.remote.upsert_item(&payload).await?;

    let mut updated = item.clone();
    updated.id = ItemId::Remote(stored.id);
    if updated.inspection_id.is_none() {
      updated.inspection_id = stored.inspection_id;
    }
    updated.photo_refs = photos.refs;
    updated.synced = photos.all_uploaded;

    Ok(updated)
  }

  /// Delete one remote record by id.
  pub async fn delete_item(&self, id: &str) -> Result<()> {
    self.remote.delete_item(id).await
  }
}

/// Build the minimal upsert payload for an item.
///
/// The id is included only when the remote store assigned it, turning the
/// call into an update; that is what makes repeated pushes idempotent.
pub fn upsert_payload(item: &InspectionItem, refs: &[PhotoRef]) -> UpsertItem {
  UpsertItem {
    id: item
      .id
      .is_remote()
      .then(|| item.id.as_str().to_string()),
    inspection_id: item.inspection_id.clone(),
    environment_id: item.environment_id.clone(),
    category_name: item.category_name.clone(),
    checklist_item_id: item.checklist_item_id.clone(),
    item_number: item.item_number,
    description: item.description.clone(),
    internal_note: item.internal_note.clone(),
    status: item.status,
    photo_urls: refs
      .iter()
      .filter(|r| r.is_remote())
      .map(|r| r.as_str().to_string())
      .collect(),
  }
}

/// Map a remotely stored record into a cached item. A record coming back
/// from the remote store is by definition synced.
pub fn stored_to_item(stored: StoredItem) -> InspectionItem {
  InspectionItem {
    id: ItemId::Remote(stored.id),
    inspection_id: stored.inspection_id,
    environment_id: stored.environment_id,
    category_name: stored.category_name,
    checklist_item_id: stored.checklist_item_id,
    item_number: stored.item_number,
    description: stored.description,
    internal_note: stored.internal_note,
    status: stored.status,
    photo_refs: stored.photo_urls.into_iter().map(PhotoRef::Remote).collect(),
    synced: true,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::mock::MockRemote;

  fn unsynced_item() -> InspectionItem {
    InspectionItem::new(
      Some("insp-1".into()),
      "kitchen".into(),
      "Plumbing".into(),
      "chk-1".into(),
      1,
      "Leak under sink".into(),
    )
  }

  #[test]
  fn test_payload_omits_id_for_local_items() {
    let item = unsynced_item();
    let payload = upsert_payload(&item, &item.photo_refs);
    assert_eq!(payload.id, None);
  }

  #[test]
  fn test_payload_carries_id_for_remote_items() {
    let mut item = unsynced_item();
    item.id = ItemId::Remote("srv-abc".into());

    let payload = upsert_payload(&item, &item.photo_refs);
    assert_eq!(payload.id.as_deref(), Some("srv-abc"));
  }

  #[test]
  fn test_payload_only_ships_remote_photo_urls() {
    let mut item = unsynced_item();
    item.photo_refs = vec![
      PhotoRef::Remote("https://blobs.example/a.jpg".into()),
      PhotoRef::Local("/tmp/pending.jpg".into()),
    ];

    let payload = upsert_payload(&item, &item.photo_refs);
    assert_eq!(payload.photo_urls, vec!["https://blobs.example/a.jpg"]);
  }

  #[tokio::test]
  async fn test_push_adopts_the_server_assigned_id() {
    let remote = MockRemote::new();
    let client = SyncClient::new(remote.clone());

    let updated = client.push_item(&unsynced_item(), "insp-1").await.unwrap();

    assert!(updated.id.is_remote());
    assert!(updated.synced);
    assert_eq!(remote.items().len(), 1);
  }

  #[tokio::test]
  async fn test_repeated_push_updates_in_place() {
    let remote = MockRemote::new();
    let client = SyncClient::new(remote.clone());

    let first = client.push_item(&unsynced_item(), "insp-1").await.unwrap();

    let mut edited = first.clone();
    edited.description = "Leak fixed upstream".into();
    edited.synced = false;
    let second = client.push_item(&edited, "insp-1").await.unwrap();

    assert_eq!(second.id, first.id);
    // The second call was an update, not an insert
    assert_eq!(remote.items().len(), 1);
    assert_eq!(remote.items()[0].description, "Leak fixed upstream");
    assert_eq!(remote.upsert_calls()[1].id.as_deref(), Some(first.id.as_str()));
  }

  #[tokio::test]
  async fn test_partial_photo_failure_leaves_item_unsynced() {
    let remote = MockRemote::new();
    remote.fail_uploads_containing("_0.");
    let client = SyncClient::new(remote.clone());

    let mut item = unsynced_item();
    item.photo_refs = vec![PhotoRef::Local(
      "data:image/png;base64,iVBORw0KGgo=".into(),
    )];

    let updated = client.push_item(&item, "insp-1").await.unwrap();

    assert!(!updated.synced);
    assert_eq!(updated.photo_refs, item.photo_refs);
    // The record itself still went up, just without the photo
    assert_eq!(remote.items().len(), 1);
    assert!(remote.items()[0].photo_urls.is_empty());
  }

  #[test]
  fn test_stored_record_maps_to_synced_item() {
    let stored = StoredItem {
      id: "srv-1".into(),
      inspection_id: Some("insp-1".into()),
      environment_id: "kitchen".into(),
      category_name: "Plumbing".into(),
      checklist_item_id: "chk-1".into(),
      item_number: 3,
      description: "d".into(),
      internal_note: "n".into(),
      status: Default::default(),
      photo_urls: vec!["https://blobs.example/a.jpg".into()],
    };

    let item = stored_to_item(stored);
    assert!(item.synced);
    assert_eq!(item.id, ItemId::Remote("srv-1".into()));
    assert_eq!(
      item.photo_refs,
      vec![PhotoRef::Remote("https://blobs.example/a.jpg".into())]
    );
  }
}
