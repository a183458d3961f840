//! Connectivity monitoring.
//!
//! A background task probes reachability and publishes the boolean over a
//! watch channel. The session loop only ever sees value transitions; every
//! offline→online edge re-triggers the same idempotent sync cycle, which is
//! all the handling flapping connectivity gets.

use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// Reachability signal consumed by the session.
pub struct ConnectivityMonitor {
  rx: watch::Receiver<bool>,
}

impl ConnectivityMonitor {
  /// Spawn the probe loop. The monitor starts offline; the first successful
  /// probe counts as a reconnect, which conveniently kicks off the initial
  /// backlog sync.
  pub fn spawn<F, Fut>(probe: F, interval: Duration) -> Self
  where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
  {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
      loop {
        let up = probe().await;
        tx.send_if_modified(|state| {
          if *state != up {
            *state = up;
            info!("Connectivity changed: {}", if up { "online" } else { "offline" });
            true
          } else {
            false
          }
        });

        if tx.is_closed() {
          break;
        }
        tokio::time::sleep(interval).await;
      }
    });

    Self { rx }
  }

  /// Wait for the next reachability transition; returns the new state.
  pub async fn transition(&mut self) -> Result<bool> {
    self
      .rx
      .changed()
      .await
      .map_err(|_| eyre!("Connectivity monitor stopped"))?;
    Ok(*self.rx.borrow_and_update())
  }
}
