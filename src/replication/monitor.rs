//! Trade monitor: polls the source wallet's activity feed and records new
//! trades into the ledger.
//!
//! Discovery and execution are decoupled through the ledger, so a slow
//! replication never delays ingestion and an ingested trade survives a
//! restart.

use crate::config::Config;
use crate::exchange::traits::AccountDataSource;
use crate::exchange::types::ActivityType;
use crate::ledger::{TradeLedger, TradeRecord};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Polls the source wallet and persists newly observed trades.
pub struct TradeMonitor {
    data: Arc<dyn AccountDataSource>,
    ledger: Arc<TradeLedger>,
    target_address: String,
    fetch_interval: Duration,
    max_trade_age: Duration,
}

impl TradeMonitor {
    pub fn new(
        data: Arc<dyn AccountDataSource>,
        ledger: Arc<TradeLedger>,
        config: &Config,
    ) -> Self {
        Self {
            data,
            ledger,
            target_address: config.wallets.target_address.clone(),
            fetch_interval: Duration::from_secs(config.monitor.fetch_interval_secs),
            max_trade_age: Duration::from_secs(config.monitor.max_trade_age_hours * 3600),
        }
    }

    /// Run the monitor until shutdown is requested.
    pub async fn run(&self, shutdown: Arc<AtomicBool>) {
        info!(target = %self.target_address, "👀 Trade monitor started");

        while !shutdown.load(Ordering::Relaxed) {
            if let Err(e) = self.poll_once(chrono::Utc::now().timestamp()).await {
                error!("Activity poll failed: {e:#}");
            }
            tokio::time::sleep(self.fetch_interval).await;
        }

        info!("Trade monitor stopped");
    }

    async fn poll_once(&self, now: i64) -> Result<usize> {
        let activities = self.data.recent_activity(&self.target_address).await;
        if activities.is_empty() {
            return Ok(0);
        }
        self.ingest(activities, now)
    }

    /// Record trades not yet known and not older than the staleness cutoff.
    ///
    /// Startup backlog protection: after downtime the activity feed replays
    /// history, and without the cutoff the executor would re-trade it all.
    fn ingest(
        &self,
        activities: Vec<crate::exchange::types::Activity>,
        now: i64,
    ) -> Result<usize> {
        let existing = self.ledger.existing_hashes()?;
        let cutoff = now - self.max_trade_age.as_secs() as i64;

        let mut ingested = 0;
        for activity in activities {
            if activity.activity_type != ActivityType::Trade {
                continue;
            }
            if activity.timestamp < cutoff {
                debug!(tx = %activity.transaction_hash, "Trade too old, skipping");
                continue;
            }
            if existing.contains(&activity.transaction_hash) {
                continue;
            }

            let record = TradeRecord::from_activity(&activity, &self.target_address);
            if self.ledger.insert(&record)? {
                info!(
                    tx = %record.transaction_hash, side = %record.side,
                    size = %record.size, price = %record.price,
                    "New trade recorded"
                );
                ingested += 1;
            }
        }

        Ok(ingested)
    }
}
