//! HTTP implementation of the remote repository.

use color_eyre::{eyre::eyre, Result};
use std::time::Duration;

use crate::config::Config;
use crate::model::Inspection;

use super::{RemoteRepository, StoredItem, UpsertItem};

/// JSON-over-HTTP remote repository client.
#[derive(Clone)]
pub struct HttpRemoteRepository {
  http: reqwest::Client,
  base_url: String,
  token: String,
}

impl HttpRemoteRepository {
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::get_api_token()?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.sync.request_timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url: config.remote.url.trim_end_matches('/').to_string(),
      token,
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/{}", self.base_url, path)
  }
}

impl RemoteRepository for HttpRemoteRepository {
  async fn upsert_item(&self, payload: &UpsertItem) -> Result<StoredItem> {
    let response = self
      .http
      .post(self.url("items"))
      .bearer_auth(&self.token)
      .json(payload)
      .send()
      .await
      .map_err(|e| eyre!("Failed to upsert item: {}", e))?;

    if !response.status().is_success() {
      return Err(eyre!("Remote rejected item upsert: {}", response.status()));
    }

    response
      .json::<StoredItem>()
      .await
      .map_err(|e| eyre!("Failed to parse upsert response: {}", e))
  }

  async fn delete_item(&self, id: &str) -> Result<()> {
    let response = self
      .http
      .delete(self.url(&format!("items/{}", id)))
      .bearer_auth(&self.token)
      .send()
      .await
      .map_err(|e| eyre!("Failed to delete item {}: {}", id, e))?;

    // A record already gone remotely counts as deleted
    if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
      return Err(eyre!(
        "Remote rejected delete of {}: {}",
        id,
        response.status()
      ));
    }

    Ok(())
  }

  async fn list_items(&self, inspection_id: &str) -> Result<Vec<StoredItem>> {
    let response = self
      .http
      .get(self.url(&format!("inspections/{}/items", inspection_id)))
      .bearer_auth(&self.token)
      .send()
      .await
      .map_err(|e| eyre!("Failed to list items for {}: {}", inspection_id, e))?;

    if !response.status().is_success() {
      return Err(eyre!("Remote rejected item list: {}", response.status()));
    }

    response
      .json::<Vec<StoredItem>>()
      .await
      .map_err(|e| eyre!("Failed to parse item list: {}", e))
  }

  async fn upload_blob(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
    let response = self
      .http
      .put(self.url(&format!("blobs/{}", path)))
      .bearer_auth(&self.token)
      .query(&[("overwrite", "true")])
      .header(reqwest::header::CONTENT_TYPE, content_type)
      .body(bytes)
      .send()
      .await
      .map_err(|e| eyre!("Failed to upload blob {}: {}", path, e))?;

    if !response.status().is_success() {
      return Err(eyre!(
        "Remote rejected blob upload {}: {}",
        path,
        response.status()
      ));
    }

    Ok(())
  }

  async fn public_url(&self, path: &str) -> Result<String> {
    Ok(self.url(&format!("blobs/{}", path)))
  }

  async fn resolve_or_create_inspection(
    &self,
    unit_id: &str,
    engineer_id: &str,
  ) -> Result<Inspection> {
    #[derive(serde::Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Body<'a> {
      engineer_id: &'a str,
    }

    let response = self
      .http
      .post(self.url(&format!("units/{}/inspections", unit_id)))
      .bearer_auth(&self.token)
      .json(&Body { engineer_id })
      .send()
      .await
      .map_err(|e| eyre!("Failed to resolve inspection for unit {}: {}", unit_id, e))?;

    if !response.status().is_success() {
      return Err(eyre!(
        "Remote rejected inspection resolve for unit {}: {}",
        unit_id,
        response.status()
      ));
    }

    response
      .json::<Inspection>()
      .await
      .map_err(|e| eyre!("Failed to parse inspection resolve response: {}", e))
  }

  async fn probe(&self) -> bool {
    self
      .http
      .get(self.url("health"))
      .timeout(Duration::from_secs(5))
      .send()
      .await
      .map(|r| r.status().is_success())
      .unwrap_or(false)
  }
}
