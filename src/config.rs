use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub remote: RemoteConfig,
  /// Engineer recorded on inspections created from this device
  pub engineer_id: String,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub sync: SyncConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
  /// Base URL of the remote repository
  pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Whether this host can still read local photo references after a
  /// restart. True for this CLI; false for hosts (browser runtimes) whose
  /// local URIs die with the process, which makes the cache sanitize
  /// non-remote photo references on write.
  #[serde(default = "default_true")]
  pub persists_local_blob_references: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      persists_local_blob_references: true,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  /// Seconds between reachability probes in watch mode
  #[serde(default = "default_probe_interval")]
  pub probe_interval_secs: u64,
  /// Per-request timeout for remote calls
  #[serde(default = "default_request_timeout")]
  pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      probe_interval_secs: default_probe_interval(),
      request_timeout_secs: default_request_timeout(),
    }
  }
}

fn default_true() -> bool {
  true
}

fn default_probe_interval() -> u64 {
  15
}

fn default_request_timeout() -> u64 {
  20
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./vistoria.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/vistoria/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/vistoria/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("vistoria.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("vistoria").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Get the remote API token from the environment.
  pub fn get_api_token() -> Result<String> {
    std::env::var("VISTORIA_API_TOKEN")
      .map_err(|_| eyre!("API token not found. Set the VISTORIA_API_TOKEN environment variable."))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_gets_defaults() {
    let config: Config =
      serde_yaml::from_str("remote:\n  url: https://api.example.com\nengineer_id: eng-7\n")
        .unwrap();

    assert_eq!(config.remote.url, "https://api.example.com");
    assert!(config.cache.persists_local_blob_references);
    assert_eq!(config.sync.probe_interval_secs, 15);
    assert_eq!(config.sync.request_timeout_secs, 20);
  }

  #[test]
  fn test_capability_flag_can_be_disabled() {
    let config: Config = serde_yaml::from_str(
      "remote:\n  url: https://api.example.com\nengineer_id: eng-7\ncache:\n  persists_local_blob_references: false\n",
    )
    .unwrap();

    assert!(!config.cache.persists_local_blob_references);
  }
}
