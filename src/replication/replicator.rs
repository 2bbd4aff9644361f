//! Order replication: proportional sizing and the FOK slice loop.
//!
//! A replicated trade is rarely fillable in one shot, so the target amount
//! is worked off slice by slice against the best level of a fresh order
//! book, with a bounded retry budget for rejected slices.

use crate::config::ExecutionConfig;
use crate::exchange::traits::OrderClient;
use crate::exchange::types::{MarketOrderArgs, OrderSide};
use anyhow::Result;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How a replication attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationOutcome {
    /// Target amount fully worked off (or nothing actionable remained).
    Completed,
    /// Replication stopped early for a market-state reason; the trade is
    /// terminal and will not be retried.
    Aborted(AbortReason),
    /// Consecutive rejections exhausted the retry budget.
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The book had no liquidity on the side we needed.
    EmptyBook,
    /// Best price drifted past the tolerance from the source trade's price.
    PriceDrift,
}

/// Proportional USDC spend for copying a buy.
///
/// The source spent `usdc_size` out of a bankroll of
/// `source_balance + usdc_size`; we spend the same fraction of our own
/// balance, capped at the full balance. Zero when either bankroll is gone.
pub fn open_spend(usdc_size: Decimal, my_balance: Decimal, source_balance: Decimal) -> Decimal {
    let denom = source_balance + usdc_size;
    if denom <= Decimal::ZERO || my_balance <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let ratio = my_balance / denom;
    (usdc_size * ratio).min(my_balance)
}

/// Shares to sell when copying a (partial) exit.
///
/// The source sold `trade_size` out of `source_position + trade_size`
/// shares; we sell the same fraction of our holding. When the source no
/// longer shows a position the exit was total, so the whole holding goes.
pub fn unwind_size(
    my_position: Decimal,
    trade_size: Decimal,
    source_position: Option<Decimal>,
) -> Decimal {
    match source_position {
        Some(source) => {
            let denom = source + trade_size;
            if denom <= Decimal::ZERO {
                return my_position;
            }
            my_position * (trade_size / denom)
        }
        None => my_position,
    }
}

/// Works a target amount through the CLOB as FOK market-order slices.
pub struct Replicator {
    orders: Arc<dyn OrderClient>,
    retry_limit: u32,
    price_tolerance: Decimal,
    fill_pause: Duration,
    reject_pause: Duration,
}

impl Replicator {
    pub fn new(orders: Arc<dyn OrderClient>, execution: &ExecutionConfig) -> Self {
        Self {
            orders,
            retry_limit: execution.retry_limit,
            price_tolerance: execution.price_tolerance,
            fill_pause: Duration::from_millis(execution.fill_pause_ms),
            reject_pause: Duration::from_millis(execution.reject_pause_ms),
        }
    }

    /// Spend up to `target_spend` USDC buying `token_id` against the asks.
    pub async fn replicate_buy(
        &self,
        token_id: &str,
        reference_price: Decimal,
        target_spend: Decimal,
    ) -> Result<ReplicationOutcome> {
        self.run_slices(token_id, OrderSide::Buy, target_spend, Some(reference_price))
            .await
    }

    /// Sell up to `target_size` shares of `token_id` into the bids.
    ///
    /// `reference_price` is `None` for liquidations, which take whatever
    /// the book offers.
    pub async fn replicate_sell(
        &self,
        token_id: &str,
        reference_price: Option<Decimal>,
        target_size: Decimal,
    ) -> Result<ReplicationOutcome> {
        self.run_slices(token_id, OrderSide::Sell, target_size, reference_price)
            .await
    }

    /// The slice loop. `remaining` is USDC for buys and shares for sells.
    ///
    /// Each iteration re-reads the book: fills and rejections both move the
    /// market, and a stale best level would just bounce off FOK matching.
    async fn run_slices(
        &self,
        token_id: &str,
        side: OrderSide,
        mut remaining: Decimal,
        reference_price: Option<Decimal>,
    ) -> Result<ReplicationOutcome> {
        let mut attempts = 0u32;

        while remaining > Decimal::ZERO && attempts < self.retry_limit {
            let book = self.orders.order_book(token_id).await?;
            let best = match side {
                OrderSide::Buy => book.best_ask(),
                OrderSide::Sell => book.best_bid(),
            };
            let Some(best) = best else {
                warn!(%token_id, ?side, "Order book empty, abandoning replication");
                return Ok(ReplicationOutcome::Aborted(AbortReason::EmptyBook));
            };

            // Price-drift guard, only meaningful when the source trade
            // carried a real price.
            if let Some(reference) = reference_price.filter(|p| *p > Decimal::ZERO) {
                let drifted = match side {
                    OrderSide::Buy => best.price - self.price_tolerance > reference,
                    OrderSide::Sell => best.price + self.price_tolerance < reference,
                };
                if drifted {
                    warn!(
                        %token_id, ?side, best_price = %best.price, %reference,
                        "Price drifted past tolerance, abandoning replication"
                    );
                    return Ok(ReplicationOutcome::Aborted(AbortReason::PriceDrift));
                }
            }

            let available = match side {
                OrderSide::Buy => best.size * best.price,
                OrderSide::Sell => best.size,
            };
            let slice = remaining.min(available);
            if slice <= Decimal::ZERO {
                break;
            }

            let args = MarketOrderArgs {
                token_id: token_id.to_string(),
                side,
                amount: slice,
                price: best.price,
            };
            let order = self.orders.create_market_order(&args).await?;
            let resp = self.orders.post_order(&order).await?;

            if resp.success {
                attempts = 0;
                remaining -= slice;
                info!(
                    %token_id, ?side, amount = %slice, price = %best.price, %remaining,
                    "Slice filled"
                );
                tokio::time::sleep(self.fill_pause).await;
            } else {
                attempts += 1;
                debug!(
                    %token_id, ?side, amount = %slice, attempts,
                    error = resp.error_msg.as_deref().unwrap_or("unknown"),
                    "Slice rejected"
                );
                tokio::time::sleep(self.reject_pause).await;
            }
        }

        if attempts >= self.retry_limit {
            Ok(ReplicationOutcome::Exhausted { attempts })
        } else {
            Ok(ReplicationOutcome::Completed)
        }
    }
}
