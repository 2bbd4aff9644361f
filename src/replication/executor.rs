//! Trade executor: drains the ledger's pending trades and replicates each
//! one against the CLOB.
//!
//! Each pending trade is classified from the source's side and current
//! positions, sized against live balances, then handed to the replicator.
//! A failure inside one trade never takes down the loop; the trade is
//! written off with its retry budget spent and the next one proceeds.

use crate::config::Config;
use crate::exchange::traits::{AccountDataSource, OrderClient};
use crate::ledger::{TradeLedger, TradeRecord};
use crate::replication::replicator::{ReplicationOutcome, Replicator};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What a source trade asks us to do with our own book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Buy into the market proportionally to the source's spend.
    Open,
    /// Sell the fraction of our holding matching the source's exit.
    Unwind,
    /// Dump our whole holding (source merged or has fully left the market).
    LiquidateAll,
    /// Unrecognized side string; nothing safe to do with it.
    Other(String),
}

/// Classify a source trade.
///
/// Sides other than BUY/SELL are rare (MERGE shows up when the source
/// combines outcome tokens back into collateral). A holding on our side
/// with no source position means whatever they did amounted to a full
/// exit, so we liquidate.
pub fn classify(record: &TradeRecord, my_position: bool, source_position: bool) -> Intent {
    match record.side.as_str() {
        "BUY" => Intent::Open,
        "SELL" => Intent::Unwind,
        "MERGE" => Intent::LiquidateAll,
        other => {
            if my_position && !source_position {
                Intent::LiquidateAll
            } else {
                Intent::Other(other.to_lowercase())
            }
        }
    }
}

/// Drives replication of pending ledger trades.
pub struct TradeExecutor {
    data: Arc<dyn AccountDataSource>,
    ledger: Arc<TradeLedger>,
    replicator: Replicator,
    target_address: String,
    proxy_address: String,
    retry_limit: u32,
    cycle_delay: Duration,
}

impl TradeExecutor {
    pub fn new(
        data: Arc<dyn AccountDataSource>,
        orders: Arc<dyn OrderClient>,
        ledger: Arc<TradeLedger>,
        config: &Config,
    ) -> Self {
        Self {
            data,
            ledger,
            replicator: Replicator::new(orders, &config.execution),
            target_address: config.wallets.target_address.clone(),
            proxy_address: config.wallets.proxy_address.clone(),
            retry_limit: config.execution.retry_limit,
            cycle_delay: Duration::from_secs(config.execution.cycle_delay_secs),
        }
    }

    /// Run the executor until shutdown is requested.
    pub async fn run(&self, shutdown: Arc<AtomicBool>) {
        info!("⚙️ Trade executor started");

        while !shutdown.load(Ordering::Relaxed) {
            if let Err(e) = self.execute_pending().await {
                error!("Executor cycle failed: {e:#}");
            }
            tokio::time::sleep(self.cycle_delay).await;
        }

        info!("Trade executor stopped");
    }

    /// One executor cycle: snapshot the pending batch and work through it.
    ///
    /// The batch is read once per cycle; trades ingested mid-batch wait for
    /// the next cycle rather than extending this one.
    pub async fn execute_pending(&self) -> Result<()> {
        let pending = self.ledger.eligible(self.retry_limit)?;
        if pending.is_empty() {
            debug!("No pending trades, waiting");
            return Ok(());
        }

        info!(count = pending.len(), "Pending trades to copy");

        for trade in pending {
            info!(tx = %trade.transaction_hash, side = %trade.side, "Copying trade");
            match self.execute_trade(&trade).await {
                Ok(()) => info!(tx = %trade.transaction_hash, "Done"),
                Err(e) => {
                    error!(tx = %trade.transaction_hash, "Trade failed: {e:#}");
                    self.ledger
                        .mark_failed(&trade.transaction_hash, self.retry_limit)?;
                }
            }
        }

        Ok(())
    }

    async fn execute_trade(&self, trade: &TradeRecord) -> Result<()> {
        let my_positions = self.data.positions(&self.proxy_address).await;
        let source_positions = self.data.positions(&self.target_address).await;

        let my_position = my_positions
            .iter()
            .find(|p| p.condition_id == trade.condition_id);
        let source_position = source_positions
            .iter()
            .find(|p| p.condition_id == trade.condition_id);

        let intent = classify(trade, my_position.is_some(), source_position.is_some());
        debug!(tx = %trade.transaction_hash, ?intent, "Classified trade");

        let outcome = match intent {
            Intent::Open => {
                let my_balance = self
                    .data
                    .usdc_balance(&self.proxy_address)
                    .await
                    .context("Failed to read own balance")?;
                let source_balance = self
                    .data
                    .usdc_balance(&self.target_address)
                    .await
                    .context("Failed to read source balance")?;

                let spend = super::replicator::open_spend(trade.usdc_size, my_balance, source_balance);
                if spend <= Decimal::ZERO {
                    info!(
                        tx = %trade.transaction_hash, %my_balance, %source_balance,
                        "Nothing to spend, skipping"
                    );
                    self.ledger.mark_done(&trade.transaction_hash)?;
                    return Ok(());
                }

                self.replicator
                    .replicate_buy(&trade.asset, trade.price, spend)
                    .await?
            }
            Intent::Unwind => {
                let Some(my_position) = my_position else {
                    debug!(tx = %trade.transaction_hash, "No position to unwind, skipping");
                    self.ledger.mark_done(&trade.transaction_hash)?;
                    return Ok(());
                };

                let size = super::replicator::unwind_size(
                    my_position.size,
                    trade.size,
                    source_position.map(|p| p.size),
                );
                self.replicator
                    .replicate_sell(&trade.asset, Some(trade.price), size)
                    .await?
            }
            Intent::LiquidateAll => {
                let Some(my_position) = my_position else {
                    debug!(tx = %trade.transaction_hash, "No position to liquidate, skipping");
                    self.ledger.mark_done(&trade.transaction_hash)?;
                    return Ok(());
                };

                // Sell our own holding's token, which for a merge is not
                // the asset named on the source's activity row.
                self.replicator
                    .replicate_sell(&my_position.asset, None, my_position.size)
                    .await?
            }
            Intent::Other(side) => {
                warn!(
                    tx = %trade.transaction_hash, %side,
                    "Unrecognized trade side, marking terminal"
                );
                self.ledger.mark_done(&trade.transaction_hash)?;
                return Ok(());
            }
        };

        match outcome {
            ReplicationOutcome::Exhausted { attempts } => {
                warn!(tx = %trade.transaction_hash, attempts, "Retry budget exhausted");
                self.ledger.mark_failed(&trade.transaction_hash, attempts)?;
            }
            ReplicationOutcome::Completed | ReplicationOutcome::Aborted(_) => {
                self.ledger.mark_done(&trade.transaction_hash)?;
            }
        }

        Ok(())
    }
}
