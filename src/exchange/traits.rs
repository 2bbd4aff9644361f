//! Client-agnostic seams between the replication engine and Polymarket.
//!
//! `AccountDataSource` covers the read-only collaborators (activity,
//! positions, free capital); `OrderClient` covers the live order book and
//! order submission. Both are object-safe so the engine can run against the
//! real HTTP clients or the paper-trading mock.

use crate::exchange::types::{
    Activity, MarketOrderArgs, OrderBook, OrderResponse, PositionSnapshot, SignedOrder,
};
use async_trait::async_trait;
use rust_decimal::Decimal;

#[cfg(test)]
use mockall::automock;

/// Read-only account data: recent activity, open positions, free capital.
///
/// Implementations must degrade gracefully on transient failure: an
/// exhausted retry budget yields an empty collection, not an error, so the
/// polling loops treat "no data" and "fetch failed" identically.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AccountDataSource: Send + Sync {
    /// Recent activity entries for an address, newest first.
    async fn recent_activity(&self, user: &str) -> Vec<Activity>;

    /// Current positions held by an address.
    async fn positions(&self, user: &str) -> Vec<PositionSnapshot>;

    /// Free USDC capital of an address.
    async fn usdc_balance(&self, user: &str) -> anyhow::Result<Decimal>;
}

/// Live order book access and order submission.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrderClient: Send + Sync {
    /// Fetch a fresh order book snapshot for an outcome token.
    async fn order_book(&self, token_id: &str) -> anyhow::Result<OrderBook>;

    /// Build a signed market order ready for submission.
    async fn create_market_order(&self, args: &MarketOrderArgs) -> anyhow::Result<SignedOrder>;

    /// Submit a signed order in fill-or-kill mode.
    async fn post_order(&self, order: &SignedOrder) -> anyhow::Result<OrderResponse>;
}
