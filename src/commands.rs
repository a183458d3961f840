//! CLI subcommands over the inspection session.

use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use std::time::Duration;

use crate::cache::{LocalCacheStore, SqliteKvStore};
use crate::config::Config;
use crate::model::{InspectionItem, ItemStatus, PhotoRef};
use crate::remote::{HttpRemoteRepository, RemoteRepository};
use crate::session::Session;
use crate::sync::ConnectivityMonitor;

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Record a new inspection item for a unit
  Add {
    /// Unit being inspected
    #[arg(short, long)]
    unit: String,
    /// Environment identifier (e.g. kitchen)
    #[arg(short, long)]
    environment: String,
    /// Category name (e.g. Plumbing)
    #[arg(long)]
    category: String,
    /// Checklist entry this finding refers to
    #[arg(long)]
    checklist_item: String,
    #[arg(short, long)]
    description: String,
    /// Internal note, not shown on reports
    #[arg(long)]
    note: Option<String>,
    /// Photo to attach (file path, file:// URI or data: URL); repeatable
    #[arg(long = "photo")]
    photos: Vec<String>,
  },

  /// Edit an existing item
  Edit {
    #[arg(short, long)]
    unit: String,
    /// Id of the item to edit
    id: String,
    #[arg(short, long)]
    description: Option<String>,
    #[arg(long)]
    note: Option<String>,
    /// Mark the finding as resolved
    #[arg(long)]
    resolved: bool,
    /// Additional photo to attach; repeatable
    #[arg(long = "photo")]
    photos: Vec<String>,
  },

  /// List the unit's items, cache-first
  List {
    #[arg(short, long)]
    unit: String,
  },

  /// Delete an item
  Delete {
    #[arg(short, long)]
    unit: String,
    /// Id of the item to delete
    id: String,
  },

  /// Reconcile the backlog with the remote store now
  Sync {
    #[arg(short, long)]
    unit: String,
  },

  /// Show cache and sync state for a unit
  Status {
    #[arg(short, long)]
    unit: String,
  },

  /// Keep running and reconcile on every reconnect
  Watch {
    #[arg(short, long)]
    unit: String,
  },
}

pub async fn run(command: Command, config: Config) -> Result<()> {
  let remote = HttpRemoteRepository::new(&config)?;
  let kv = SqliteKvStore::open()?;
  let store = LocalCacheStore::new(kv, config.cache.persists_local_blob_references);

  match command {
    Command::Add {
      unit,
      environment,
      category,
      checklist_item,
      description,
      note,
      photos,
    } => {
      let mut session = open_session(&unit, &config, store, remote).await?;

      let mut item = InspectionItem::new(
        None,
        environment,
        category,
        checklist_item,
        session.next_item_number(),
        description,
      );
      if let Some(note) = note {
        item.internal_note = note;
      }
      item.photo_refs = photos.into_iter().map(PhotoRef::Local).collect();

      let number = item.item_number;
      session.add_or_update_item(item).await?;

      let recorded = session
        .items()
        .iter()
        .find(|i| i.item_number == number)
        .ok_or_else(|| eyre!("Recorded item vanished from the session"))?;
      println!(
        "Recorded item #{} ({}){}",
        number,
        recorded.id,
        sync_suffix(recorded.synced, session.is_online())
      );
      Ok(())
    }

    Command::Edit {
      unit,
      id,
      description,
      note,
      resolved,
      photos,
    } => {
      let mut session = open_session(&unit, &config, store, remote).await?;
      let item_id = session
        .find_id(&id)
        .ok_or_else(|| eyre!("No item with id {}", id))?;

      let mut item = session
        .items()
        .iter()
        .find(|i| i.id == item_id)
        .cloned()
        .ok_or_else(|| eyre!("No item with id {}", id))?;

      if let Some(description) = description {
        item.description = description;
      }
      if let Some(note) = note {
        item.internal_note = note;
      }
      if resolved {
        item.status = ItemStatus::Resolved;
      }
      item
        .photo_refs
        .extend(photos.into_iter().map(PhotoRef::Local));

      session.add_or_update_item(item).await?;

      let edited = session.items().iter().find(|i| i.id == item_id);
      let synced = edited.map(|i| i.synced).unwrap_or(false);
      println!("Updated item {}{}", id, sync_suffix(synced, session.is_online()));
      Ok(())
    }

    Command::List { unit } => {
      let session = open_session(&unit, &config, store, remote).await?;

      if session.items().is_empty() {
        println!("No items recorded for unit {}", unit);
        return Ok(());
      }

      for item in session.items() {
        println!(
          "#{:<4} [{}] {} ({} / {}, {} photo{})  id={}",
          item.item_number,
          if item.synced { "synced" } else { "local " },
          item.description,
          item.environment_id,
          item.category_name,
          item.photo_refs.len(),
          if item.photo_refs.len() == 1 { "" } else { "s" },
          item.id,
        );
      }
      Ok(())
    }

    Command::Delete { unit, id } => {
      let mut session = open_session(&unit, &config, store, remote).await?;
      let item_id = session
        .find_id(&id)
        .ok_or_else(|| eyre!("No item with id {}", id))?;

      session.delete_item(&item_id).await?;

      let pending = session.pending_delete_count()?;
      if pending > 0 {
        println!("Deleted item {} locally; remote delete pending", id);
      } else {
        println!("Deleted item {}", id);
      }
      Ok(())
    }

    Command::Sync { unit } => {
      let mut session = open_session(&unit, &config, store, remote).await?;
      if !session.is_online() {
        println!("Offline; nothing reconciled. Changes stay cached locally.");
        return Ok(());
      }

      session.sync_now().await?;
      session.refresh().await?;
      print_status(&session)?;
      Ok(())
    }

    Command::Status { unit } => {
      let session = open_session(&unit, &config, store, remote).await?;
      print_status(&session)?;
      Ok(())
    }

    Command::Watch { unit } => {
      let probe_remote = remote.clone();
      let mut monitor = ConnectivityMonitor::spawn(
        move || {
          let remote = probe_remote.clone();
          async move { remote.probe().await }
        },
        Duration::from_secs(config.sync.probe_interval_secs),
      );

      let mut session = open_session(&unit, &config, store, remote).await?;
      println!("Watching unit {}; Ctrl-C to stop.", unit);

      loop {
        tokio::select! {
          _ = tokio::signal::ctrl_c() => break,
          transition = monitor.transition() => {
            if transition? {
              session.on_reconnect().await?;
              println!(
                "Reconciled after reconnect: {} unsynced item(s), {} pending delete(s) left",
                session.unsynced_count(),
                session.pending_delete_count()?,
              );
            } else {
              session.went_offline();
              println!("Connection lost; changes keep caching locally.");
            }
          }
        }
      }
      Ok(())
    }
  }
}

async fn open_session(
  unit: &str,
  config: &Config,
  store: LocalCacheStore<SqliteKvStore>,
  remote: HttpRemoteRepository,
) -> Result<Session<HttpRemoteRepository, SqliteKvStore>> {
  let online = remote.probe().await;
  Session::open(unit, &config.engineer_id, store, remote, online).await
}

fn print_status(session: &Session<HttpRemoteRepository, SqliteKvStore>) -> Result<()> {
  let scope = match session.inspection_id() {
    Some(id) => format!("inspection {}", id),
    None => format!("no inspection assigned yet ({})", session.cache_key().description()),
  };
  println!(
    "{}{} | {} | {} item(s), {} unsynced, {} pending delete(s)",
    if session.is_online() { "online" } else { "offline" },
    if session.is_syncing() { " (syncing)" } else { "" },
    scope,
    session.items().len(),
    session.unsynced_count(),
    session.pending_delete_count()?,
  );
  Ok(())
}

fn sync_suffix(synced: bool, online: bool) -> &'static str {
  if synced {
    " [synced]"
  } else if online {
    " [sync pending]"
  } else {
    " [offline, cached locally]"
  }
}
