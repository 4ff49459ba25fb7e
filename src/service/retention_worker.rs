//! Background retention worker
//!
//! Runs the trash sweep on a fixed interval with the configured retention
//! window, so quarantined entries are purged even when no admin asks.

use crate::service::trash_service::TrashService;
use chrono::Utc;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

pub struct RetentionWorker {
    trash: Arc<TrashService>,
    sweep_interval: Duration,
}

impl RetentionWorker {
    pub fn new(trash: Arc<TrashService>, sweep_interval: Duration) -> Self {
        Self {
            trash,
            sweep_interval,
        }
    }

    /// Start the worker as a background task (non-blocking)
    pub fn start_background(self) -> tokio::task::JoinHandle<()> {
        info!(
            "Starting retention worker with {}s interval, retention {} days",
            self.sweep_interval.as_secs(),
            self.trash.retention().num_days()
        );

        tokio::spawn(async move {
            let mut interval = time::interval(self.sweep_interval);
            loop {
                interval.tick().await;
                self.run_once().await;
            }
        })
    }

    /// One sweep; failures are logged and retried on the next tick
    pub async fn run_once(&self) -> usize {
        match self.trash.sweep_expired(Utc::now()).await {
            Ok(purged) => {
                debug!("Retention sweep purged {} entries", purged);
                purged
            }
            Err(e) => {
                error!("Retention sweep failed: {}", e);
                0
            }
        }
    }
}
