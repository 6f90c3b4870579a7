//! Periodic expiry of overdue approval requests.
//!
//! # Responsibilities
//! - Tick on a fixed interval and run `Escalator::sweep_expired`
//! - Exit promptly on the shutdown broadcast

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::escalation::orchestrator::Escalator;

pub struct ExpirySweeper {
    escalator: Arc<Escalator>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(escalator: Arc<Escalator>, interval: Duration) -> Self {
        Self {
            escalator,
            interval: interval.max(Duration::from_millis(10)),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Expiry sweeper starting");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let expired = self.escalator.sweep_expired().await;
                    if !expired.is_empty() {
                        tracing::info!(count = expired.len(), "Expired overdue approval requests");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Expiry sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
