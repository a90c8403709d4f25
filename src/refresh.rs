//! Background price refresh
//!
//! Periodically re-fetches the price list in a tokio task and delivers
//! results over a channel, for the `watch` command.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::data::{Currency, PriceSnapshot};
use crate::prices::PriceService;

/// Messages sent from the background refresh task
#[derive(Debug, Clone)]
pub enum RefreshMessage {
    /// A refresh cycle started
    RefreshStarted,
    /// New prices are available
    PricesUpdated(PriceSnapshot),
    /// A refresh cycle finished
    RefreshCompleted,
}

/// Configuration for the refresh loop
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Time between refreshes
    pub interval: Duration,
    /// Whether auto-refresh is enabled
    pub enabled: bool,
    /// Fetch once right away instead of waiting a full interval
    pub immediate: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            enabled: true,
            immediate: true,
        }
    }
}

/// Handle for controlling the background refresh task
pub struct RefreshHandle {
    receiver: mpsc::Receiver<RefreshMessage>,
    shutdown_tx: mpsc::Sender<()>,
}

impl RefreshHandle {
    /// Spawns the refresh task for `currency`
    ///
    /// With `config.enabled == false` nothing is spawned and the receiver
    /// never yields a message.
    pub fn spawn(service: Arc<PriceService>, currency: Currency, config: RefreshConfig) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(32);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        if config.enabled {
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(config.interval);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                if !config.immediate {
                    // The first tick completes immediately
                    interval.tick().await;
                }

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if msg_tx.send(RefreshMessage::RefreshStarted).await.is_err() {
                                break;
                            }
                            let snapshot = service.fetch_prices(currency).await;
                            debug!(%currency, source = snapshot.source.as_str(), "refreshed prices");
                            if msg_tx.send(RefreshMessage::PricesUpdated(snapshot)).await.is_err() {
                                break;
                            }
                            let _ = msg_tx.send(RefreshMessage::RefreshCompleted).await;
                        }
                        _ = shutdown_rx.recv() => {
                            break;
                        }
                    }
                }
            });
        }

        Self {
            receiver: msg_rx,
            shutdown_tx,
        }
    }

    /// Waits for the next message; `None` once the task has stopped
    pub async fn recv(&mut self) -> Option<RefreshMessage> {
        self.receiver.recv().await
    }

    /// Stops the background task
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}
