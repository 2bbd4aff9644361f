//! Mock exchange for paper trading and tests.
//!
//! Implements both client seams against in-memory state. Order books and
//! post-order outcomes can be scripted per token (tests), or book reads can
//! be delegated to a live client while fills stay simulated (paper mode).

use crate::exchange::traits::{AccountDataSource, OrderClient};
use crate::exchange::types::{
    Activity, MarketOrderArgs, OrderBook, OrderResponse, OrderSide, PositionSnapshot, SignedOrder,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// In-memory stand-in for the Data API and the CLOB.
#[derive(Default)]
pub struct MockExchange {
    /// Scripted books per token; the last snapshot repeats once drained.
    books: RwLock<HashMap<String, VecDeque<OrderBook>>>,
    /// Scripted post-order outcomes; defaults to success when empty.
    post_plan: RwLock<VecDeque<bool>>,
    /// Every order that reached submission, in order.
    submitted: RwLock<Vec<MarketOrderArgs>>,
    activities: RwLock<Vec<Activity>>,
    positions: RwLock<HashMap<String, Vec<PositionSnapshot>>>,
    balances: RwLock<HashMap<String, Decimal>>,
    /// Live client to delegate book reads to (paper-trading mode).
    book_source: Option<Arc<dyn OrderClient>>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paper-trading construction: real books, simulated fills.
    pub fn with_book_source(book_source: Arc<dyn OrderClient>) -> Self {
        info!("📝 Paper trading: live order books, simulated fills");
        Self {
            book_source: Some(book_source),
            ..Self::default()
        }
    }

    pub async fn set_activities(&self, activities: Vec<Activity>) {
        *self.activities.write().await = activities;
    }

    pub async fn set_positions(&self, user: &str, positions: Vec<PositionSnapshot>) {
        self.positions
            .write()
            .await
            .insert(user.to_string(), positions);
    }

    pub async fn set_balance(&self, user: &str, balance: Decimal) {
        self.balances.write().await.insert(user.to_string(), balance);
    }

    /// Queue order book snapshots for a token, served in order.
    pub async fn push_book(&self, token_id: &str, book: OrderBook) {
        self.books
            .write()
            .await
            .entry(token_id.to_string())
            .or_default()
            .push_back(book);
    }

    /// Script the outcomes of upcoming order submissions.
    pub async fn plan_post_results(&self, results: impl IntoIterator<Item = bool>) {
        self.post_plan.write().await.extend(results);
    }

    /// Orders that reached submission, in submission order.
    pub async fn submitted_orders(&self) -> Vec<MarketOrderArgs> {
        self.submitted.read().await.clone()
    }
}

#[async_trait]
impl AccountDataSource for MockExchange {
    async fn recent_activity(&self, _user: &str) -> Vec<Activity> {
        self.activities.read().await.clone()
    }

    async fn positions(&self, user: &str) -> Vec<PositionSnapshot> {
        self.positions
            .read()
            .await
            .get(user)
            .cloned()
            .unwrap_or_default()
    }

    async fn usdc_balance(&self, user: &str) -> Result<Decimal> {
        self.balances
            .read()
            .await
            .get(user)
            .copied()
            .ok_or_else(|| anyhow!("no balance configured for {user}"))
    }
}

#[async_trait]
impl OrderClient for MockExchange {
    async fn order_book(&self, token_id: &str) -> Result<OrderBook> {
        {
            let mut books = self.books.write().await;
            if let Some(queue) = books.get_mut(token_id) {
                if queue.len() > 1 {
                    return Ok(queue.pop_front().unwrap_or_default());
                }
                if let Some(book) = queue.front() {
                    return Ok(book.clone());
                }
            }
        }

        match &self.book_source {
            Some(source) => source.order_book(token_id).await,
            None => Ok(OrderBook::default()),
        }
    }

    async fn create_market_order(&self, args: &MarketOrderArgs) -> Result<SignedOrder> {
        Ok(SignedOrder {
            body: serde_json::to_value(args)?,
        })
    }

    async fn post_order(&self, order: &SignedOrder) -> Result<OrderResponse> {
        let success = self.post_plan.write().await.pop_front().unwrap_or(true);

        let token_id = order.body["tokenID"].as_str().unwrap_or_default().to_string();
        let side = if order.body["side"] == "BUY" {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        let amount = decimal_field(&order.body, "amount");
        let price = decimal_field(&order.body, "price");

        self.submitted.write().await.push(MarketOrderArgs {
            token_id: token_id.clone(),
            side,
            amount,
            price,
        });

        if success {
            info!(%token_id, ?side, %amount, %price, "Mock order filled");
            Ok(OrderResponse {
                success: true,
                order_id: Some(format!("mock-{}", self.submitted.read().await.len())),
                status: Some("matched".to_string()),
                error_msg: None,
            })
        } else {
            Ok(OrderResponse {
                success: false,
                error_msg: Some("mock rejection".to_string()),
                ..OrderResponse::default()
            })
        }
    }
}

/// Order bodies carry amounts either as JSON numbers (this mock) or strings
/// (the live client); accept both.
fn decimal_field(body: &serde_json::Value, key: &str) -> Decimal {
    match &body[key] {
        serde_json::Value::String(s) => Decimal::from_str(s).unwrap_or_default(),
        other => other
            .as_f64()
            .and_then(Decimal::from_f64_retain)
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::types::BookLevel;
    use rust_decimal_macros::dec;

    fn book(bid: Decimal, bid_size: Decimal) -> OrderBook {
        OrderBook {
            bids: vec![BookLevel {
                price: bid,
                size: bid_size,
            }],
            asks: vec![],
        }
    }

    #[tokio::test]
    async fn test_scripted_books_served_in_order_then_last_repeats() {
        let mock = MockExchange::new();
        mock.push_book("t", book(dec!(0.40), dec!(10))).await;
        mock.push_book("t", book(dec!(0.42), dec!(5))).await;

        assert_eq!(mock.order_book("t").await.unwrap().bids[0].price, dec!(0.40));
        assert_eq!(mock.order_book("t").await.unwrap().bids[0].price, dec!(0.42));
        // Last snapshot repeats
        assert_eq!(mock.order_book("t").await.unwrap().bids[0].price, dec!(0.42));
    }

    #[tokio::test]
    async fn test_post_plan_consumed_then_defaults_to_success() {
        let mock = MockExchange::new();
        mock.plan_post_results([false]).await;

        let order = mock
            .create_market_order(&MarketOrderArgs {
                token_id: "t".to_string(),
                side: OrderSide::Sell,
                amount: dec!(3),
                price: dec!(0.4),
            })
            .await
            .unwrap();

        assert!(!mock.post_order(&order).await.unwrap().success);
        assert!(mock.post_order(&order).await.unwrap().success);
        assert_eq!(mock.submitted_orders().await.len(), 2);
    }

    #[tokio::test]
    async fn test_unconfigured_balance_is_an_error() {
        let mock = MockExchange::new();
        mock.set_balance("0xknown", dec!(100)).await;
        assert_eq!(mock.usdc_balance("0xknown").await.unwrap(), dec!(100));
        assert!(mock.usdc_balance("0xunknown").await.is_err());
    }
}
