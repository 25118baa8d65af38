//! Cycle loop driving one feed
//!
//! Bootstraps the provider session, then runs cycles back to back with the
//! feed's delay in between. A failed cycle is logged and the loop moves on;
//! only cancellation (or an optional cycle budget) stops it. Cancellation is
//! observed between cycles and during the delay, never mid-cycle.

use crate::db::SqliteDb;
use crate::feeds::Feed;
use crate::provider::QuoteProvider;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Drives one feed until cancelled
pub struct Poller {
    feed: Feed,
    provider: Arc<dyn QuoteProvider>,
    db: Arc<SqliteDb>,
    rebootstrap_threshold: usize,
    max_cycles: Option<u64>,
}

impl Poller {
    pub fn new(feed: Feed, provider: Arc<dyn QuoteProvider>, db: Arc<SqliteDb>) -> Self {
        Self {
            feed,
            provider,
            db,
            rebootstrap_threshold: 1,
            max_cycles: None,
        }
    }

    /// Session rejections in one cycle that trigger a fresh bootstrap
    /// (0 disables re-bootstrapping)
    pub fn with_rebootstrap_threshold(mut self, threshold: usize) -> Self {
        self.rebootstrap_threshold = threshold;
        self
    }

    /// Stop on its own after `cycles` cycles
    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    /// Run the loop on the tokio runtime
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<u64> {
        tokio::spawn(self.run(cancel))
    }

    /// Run until cancelled or the cycle budget is spent; returns the number
    /// of cycles completed
    pub async fn run(self, cancel: CancellationToken) -> u64 {
        let name = self.feed.kind().name();
        info!(
            "Starting the {} fetcher ({} entities, every {:?})...",
            name,
            self.feed.entities().len(),
            self.feed.interval()
        );

        self.bootstrap().await;

        let mut cycles = 0u64;
        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.feed.run_cycle(self.provider.as_ref(), &self.db).await {
                Ok(report) => {
                    info!(
                        "[{}] {} cycle: {} fetched, {} failed, {} inserted, {} updated",
                        report.timestamp,
                        name,
                        report.fetched,
                        report.failed,
                        report.inserted,
                        report.updated
                    );

                    if self.rebootstrap_threshold > 0
                        && report.session_rejections >= self.rebootstrap_threshold
                    {
                        warn!(
                            "{} fetches rejected by provider, re-establishing session",
                            report.session_rejections
                        );
                        self.bootstrap().await;
                    }
                }
                Err(e) => {
                    error!("{} cycle failed: {}", name, e);
                }
            }

            cycles += 1;
            if self.max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.feed.interval()) => {}
            }
        }

        info!("{} fetcher stopped after {} cycles", name, cycles);
        cycles
    }

    async fn bootstrap(&self) {
        if let Err(e) = self.provider.bootstrap().await {
            // Fetches will fail and be logged until a later bootstrap succeeds
            error!("Failed to establish {} session: {}", self.provider.id(), e);
        }
    }
}
