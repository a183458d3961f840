//! Photo upload pipeline.
//!
//! Turns local photo references into public blob URLs. Already-remote
//! references pass through untouched, which is what bounds the network cost
//! of repeated sync cycles. Uploads target deterministic timestamped paths
//! with overwrite semantics, so a retried upload after an interrupted pass
//! lands on the same object instead of duplicating it.

use base64::Engine;
use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use tracing::warn;

use crate::model::{ItemId, PhotoRef};
use crate::remote::RemoteRepository;

const DEFAULT_EXT: &str = "jpg";

/// Result of one pipeline run over an item's photo list.
#[derive(Debug, Clone)]
pub struct PhotoUploadOutcome {
  /// Photo references in original order; uploaded slots became remote URLs,
  /// failed slots keep their original local reference
  pub refs: Vec<PhotoRef>,
  /// Storage paths of blobs uploaded in this run
  pub storage_paths: Vec<String>,
  /// True iff every reference is now remote
  pub all_uploaded: bool,
}

/// Upload every local reference in `refs`, keeping slot order.
///
/// A single photo's failure never aborts the remaining photos; it keeps its
/// local reference and drags `all_uploaded` to false so the owning item
/// stays unsynced and is retried on the next cycle.
pub async fn upload_photos<R: RemoteRepository>(
  remote: &R,
  item_id: &ItemId,
  owner_scope: &str,
  refs: &[PhotoRef],
) -> PhotoUploadOutcome {
  let stamp = Utc::now().timestamp_millis();
  let mut out = Vec::with_capacity(refs.len());
  let mut storage_paths = Vec::new();
  let mut all_uploaded = true;

  for (index, photo) in refs.iter().enumerate() {
    if photo.is_remote() {
      out.push(photo.clone());
      continue;
    }

    let ext = extension_for(photo.as_str());
    let path = format!("{}/{}/{}_{}.{}", owner_scope, item_id, stamp, index, ext);

    match upload_one(remote, photo.as_str(), &path, &ext).await {
      Ok(url) => {
        storage_paths.push(path);
        out.push(PhotoRef::Remote(url));
      }
      Err(e) => {
        warn!("Photo upload failed for slot {} of item {}: {}", index, item_id, e);
        all_uploaded = false;
        out.push(photo.clone());
      }
    }
  }

  PhotoUploadOutcome {
    refs: out,
    storage_paths,
    all_uploaded,
  }
}

async fn upload_one<R: RemoteRepository>(
  remote: &R,
  reference: &str,
  path: &str,
  ext: &str,
) -> Result<String> {
  let bytes = read_blob(reference).await?;
  remote.upload_blob(path, bytes, content_type_for(ext)).await?;
  remote.public_url(path).await
}

/// Read the bytes behind a local reference: an inline `data:` URL, a
/// `file://` URI, or a plain filesystem path.
async fn read_blob(reference: &str) -> Result<Vec<u8>> {
  if let Some(rest) = reference.strip_prefix("data:") {
    let payload = rest
      .split_once(";base64,")
      .map(|(_, p)| p)
      .ok_or_else(|| eyre!("Unsupported data URL encoding"))?;
    return base64::engine::general_purpose::STANDARD
      .decode(payload)
      .map_err(|e| eyre!("Failed to decode data URL: {}", e));
  }

  let path = reference.strip_prefix("file://").unwrap_or(reference);
  tokio::fs::read(path)
    .await
    .map_err(|e| eyre!("Failed to read photo {}: {}", path, e))
}

/// Derive the storage extension: MIME type for data URLs, trailing file
/// extension otherwise, `jpg` as the fallback.
fn extension_for(reference: &str) -> String {
  if let Some(rest) = reference.strip_prefix("data:") {
    let mime = rest.split(&[';', ','][..]).next().unwrap_or_default();
    return match mime {
      "image/jpeg" | "image/jpg" => "jpg".to_string(),
      "image/png" => "png".to_string(),
      "image/webp" => "webp".to_string(),
      "image/gif" => "gif".to_string(),
      "image/heic" => "heic".to_string(),
      _ => DEFAULT_EXT.to_string(),
    };
  }

  let trimmed = reference.split(&['?', '#'][..]).next().unwrap_or(reference);
  match trimmed.rsplit_once('.') {
    Some((_, ext)) if !ext.is_empty() && ext.len() <= 4 && !ext.contains('/') => {
      ext.to_ascii_lowercase()
    }
    _ => DEFAULT_EXT.to_string(),
  }
}

fn content_type_for(ext: &str) -> &'static str {
  match ext {
    "jpg" | "jpeg" => "image/jpeg",
    "png" => "image/png",
    "webp" => "image/webp",
    "gif" => "image/gif",
    "heic" => "image/heic",
    _ => "application/octet-stream",
  }
}
