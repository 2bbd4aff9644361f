//! Type definitions for Polymarket Data API and CLOB payloads.
//!
//! The Data API returns sizes and prices as JSON numbers; the CLOB order
//! book returns them as strings, hence the `rust_decimal::serde::str`
//! annotations on the book types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of an account activity entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActivityType {
    Trade,
    Split,
    Merge,
    Redeem,
    Reward,
    Conversion,
    #[serde(other)]
    Unknown,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Trade => "TRADE",
            ActivityType::Split => "SPLIT",
            ActivityType::Merge => "MERGE",
            ActivityType::Redeem => "REDEEM",
            ActivityType::Reward => "REWARD",
            ActivityType::Conversion => "CONVERSION",
            ActivityType::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "TRADE" => ActivityType::Trade,
            "SPLIT" => ActivityType::Split,
            "MERGE" => ActivityType::Merge,
            "REDEEM" => ActivityType::Redeem,
            "REWARD" => ActivityType::Reward,
            "CONVERSION" => ActivityType::Conversion,
            _ => ActivityType::Unknown,
        }
    }
}

/// One entry from `GET /activities?user=<addr>`.
///
/// `side` stays a raw string: observed values are BUY/SELL and occasionally
/// MERGE, but the API does not document a closed set, and unclassifiable
/// sides must survive round-tripping through the ledger for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub transaction_hash: String,
    pub condition_id: String,
    /// Outcome token identifier
    pub asset: String,
    #[serde(default)]
    pub side: String,
    /// Shares traded
    #[serde(default)]
    pub size: Decimal,
    /// USDC notional of the trade
    #[serde(default)]
    pub usdc_size: Decimal,
    /// Price per share at execution
    #[serde(default)]
    pub price: Decimal,
    /// Unix timestamp in seconds
    pub timestamp: i64,
}

/// One entry from `GET /positions?user=<addr>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSnapshot {
    pub condition_id: String,
    /// Outcome token identifier
    pub asset: String,
    /// Shares held
    pub size: Decimal,
}

/// One price level of the CLOB order book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookLevel {
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub size: Decimal,
}

/// Order book snapshot from `GET /book?token_id=<asset>`.
///
/// Used only for best-price selection and never cached beyond one
/// replicator iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    #[serde(default)]
    pub asks: Vec<BookLevel>,
}

impl OrderBook {
    /// Highest-priced bid, the best available counter-price for a sell.
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.iter().max_by(|a, b| a.price.cmp(&b.price))
    }

    /// Lowest-priced ask, the best available counter-price for a buy.
    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.iter().min_by(|a, b| a.price.cmp(&b.price))
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Market order request.
///
/// For buys `amount` is USDC notional; for sells it is shares. This mirrors
/// the CLOB's market-order convention.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOrderArgs {
    #[serde(rename = "tokenID")]
    pub token_id: String,
    pub side: OrderSide,
    pub amount: Decimal,
    pub price: Decimal,
}

/// A market order prepared for submission.
///
/// Wallet-level EIP-712 signing belongs to the exchange client library and
/// is out of scope here; the payload carries the L2-authenticated order
/// body the CLOB accepts.
#[derive(Debug, Clone, Serialize)]
pub struct SignedOrder {
    pub body: serde_json::Value,
}

/// Response from order submission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error_msg: Option<String>,
    #[serde(default, rename = "orderID")]
    pub order_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}
