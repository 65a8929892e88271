//! Background scheduler that ticks the delivery worker.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::delivery::DeliveryWorker;

/// Drives [`DeliveryWorker::run_cycle`] on a fixed interval until stopped.
pub struct SyncScheduler {
    worker: Arc<DeliveryWorker>,
    poll_interval: Duration,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
}

impl SyncScheduler {
    pub fn new(worker: Arc<DeliveryWorker>, poll_interval: Duration) -> Self {
        Self {
            worker,
            poll_interval,
            shutdown: Mutex::new(None),
        }
    }

    /// Spawn the polling loop. Returns false if it is already running.
    pub fn start(&self) -> bool {
        let mut shutdown = self.shutdown.lock();
        if shutdown.is_some() {
            return false;
        }

        let (tx, mut rx) = watch::channel(false);
        *shutdown = Some(tx);

        let worker = Arc::clone(&self.worker);
        let poll_interval = self.poll_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        worker.run_cycle().await;
                    }
                }
            }
            tracing::info!(target: "outbox", "sync scheduler stopped");
        });

        tracing::info!(
            target: "outbox",
            poll_interval = ?self.poll_interval,
            "sync scheduler started"
        );
        true
    }

    /// Signal the polling loop to exit. Safe to call when not running.
    pub fn stop(&self) {
        if let Some(tx) = self.shutdown.lock().take() {
            let _ = tx.send(true);
        }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.lock().is_some()
    }
}
