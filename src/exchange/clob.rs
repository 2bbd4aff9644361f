//! Polymarket CLOB client: order book reads and market-order submission.
//!
//! Orders are submitted fill-or-kill with L2 request authentication
//! (HMAC-SHA256 over `timestamp + method + path + body`). Wallet-level
//! EIP-712 order signing is owned by the exchange client library and is not
//! reimplemented here.

use crate::config::ApiConfig;
use crate::exchange::traits::OrderClient;
use crate::exchange::types::{MarketOrderArgs, OrderBook, OrderResponse, SignedOrder};
use crate::utils::decimal::round_down_to_lot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;

const ORDER_PATH: &str = "/order";
/// Order amounts are quoted to cent precision.
const AMOUNT_LOT: Decimal = dec!(0.01);

/// Errors raised while building an order, before anything reaches the wire.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order amount must be positive, got {0}")]
    InvalidAmount(Decimal),
    #[error("CLOB credentials are not configured (api_key/api_secret/api_passphrase)")]
    MissingCredentials,
}

/// HTTP client for the Polymarket CLOB.
pub struct ClobClient {
    http: Client,
    base_url: String,
    address: String,
    api_key: String,
    api_secret: String,
    api_passphrase: String,
}

impl ClobClient {
    /// Create a new CLOB client for the given proxy wallet.
    pub fn new(config: &ApiConfig, address: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.clob_api_url.trim_end_matches('/').to_string(),
            address: address.to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            api_passphrase: config.api_passphrase.clone(),
        })
    }

    /// HMAC-SHA256 signature for an authenticated request.
    fn sign(&self, timestamp: u64, method: &str, path: &str, body: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(format!("{timestamp}{method}{path}{body}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Current timestamp in seconds.
    fn timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_secs()
    }
}

#[async_trait]
impl OrderClient for ClobClient {
    async fn order_book(&self, token_id: &str) -> Result<OrderBook> {
        let url = format!("{}/book?token_id={}", self.base_url, token_id);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to fetch order book")?;

        response
            .json()
            .await
            .context("Failed to parse order book response")
    }

    async fn create_market_order(&self, args: &MarketOrderArgs) -> Result<SignedOrder> {
        if self.api_key.is_empty() || self.api_secret.is_empty() || self.api_passphrase.is_empty()
        {
            return Err(OrderError::MissingCredentials.into());
        }

        let amount = round_down_to_lot(args.amount, AMOUNT_LOT);
        if amount <= Decimal::ZERO {
            return Err(OrderError::InvalidAmount(args.amount).into());
        }

        let body = json!({
            "maker": self.address,
            "tokenID": args.token_id,
            "side": args.side,
            "amount": amount.to_string(),
            "price": args.price.to_string(),
            "orderType": "FOK",
            "salt": Self::timestamp(),
        });

        debug!(token_id = %args.token_id, side = ?args.side, %amount, price = %args.price, "Built market order");
        Ok(SignedOrder { body })
    }

    async fn post_order(&self, order: &SignedOrder) -> Result<OrderResponse> {
        let body = order.body.to_string();
        let timestamp = Self::timestamp();
        let signature = self.sign(timestamp, "POST", ORDER_PATH, &body);

        let url = format!("{}{}", self.base_url, ORDER_PATH);
        let response = self
            .http
            .post(&url)
            .header("POLY_ADDRESS", &self.address)
            .header("POLY_API_KEY", &self.api_key)
            .header("POLY_PASSPHRASE", &self.api_passphrase)
            .header("POLY_TIMESTAMP", timestamp.to_string())
            .header("POLY_SIGNATURE", signature)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .context("Failed to post order")?;

        let status = response.status();
        if !status.is_success() {
            // Business rejection, not a transport failure: the replicator
            // decides whether to retry against a fresh book.
            let message = response.text().await.unwrap_or_default();
            return Ok(OrderResponse {
                success: false,
                error_msg: Some(format!("{status}: {message}")),
                ..OrderResponse::default()
            });
        }

        response
            .json()
            .await
            .context("Failed to parse order response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::types::OrderSide;
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> ClobClient {
        let config = ApiConfig {
            clob_api_url: server.uri(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            api_passphrase: "pass".to_string(),
            ..ApiConfig::default()
        };
        ClobClient::new(&config, "0xproxy").unwrap()
    }

    fn buy_args(amount: Decimal) -> MarketOrderArgs {
        MarketOrderArgs {
            token_id: "777".to_string(),
            side: OrderSide::Buy,
            amount,
            price: dec!(0.55),
        }
    }

    #[tokio::test]
    async fn test_order_book_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/book"))
            .and(query_param("token_id", "777"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "bids": [{"price": "0.40", "size": "12"}],
                "asks": [{"price": "0.60", "size": "7"}]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let book = client.order_book("777").await.unwrap();
        assert_eq!(book.best_bid().unwrap().price, dec!(0.40));
        assert_eq!(book.best_ask().unwrap().size, dec!(7));
    }

    #[tokio::test]
    async fn test_create_market_order_rounds_amount_down() {
        let server = MockServer::start().await;
        let client = test_client(&server);
        let order = client.create_market_order(&buy_args(dec!(10.567))).await.unwrap();
        assert_eq!(order.body["amount"], "10.56");
        assert_eq!(order.body["orderType"], "FOK");
    }

    #[tokio::test]
    async fn test_create_market_order_rejects_dust() {
        let server = MockServer::start().await;
        let client = test_client(&server);
        // Rounds down to zero, must not reach the wire
        assert!(client.create_market_order(&buy_args(dec!(0.004))).await.is_err());
    }

    #[tokio::test]
    async fn test_create_market_order_requires_credentials() {
        let server = MockServer::start().await;
        let config = ApiConfig {
            clob_api_url: server.uri(),
            ..ApiConfig::default()
        };
        let client = ClobClient::new(&config, "0xproxy").unwrap();
        assert!(client.create_market_order(&buy_args(dec!(10))).await.is_err());
    }

    #[tokio::test]
    async fn test_post_order_sends_l2_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/order"))
            .and(header_exists("POLY_SIGNATURE"))
            .and(header_exists("POLY_API_KEY"))
            .and(header_exists("POLY_TIMESTAMP"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "orderID": "0xorder"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let signed = client.create_market_order(&buy_args(dec!(10))).await.unwrap();
        let response = client.post_order(&signed).await.unwrap();
        assert!(response.success);
        assert_eq!(response.order_id.as_deref(), Some("0xorder"));
    }

    #[tokio::test]
    async fn test_post_order_maps_rejection_to_unsuccessful_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/order"))
            .respond_with(ResponseTemplate::new(400).set_body_string("not enough balance"))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let signed = client.create_market_order(&buy_args(dec!(10))).await.unwrap();
        let response = client.post_order(&signed).await.unwrap();
        assert!(!response.success);
        assert!(response.error_msg.unwrap().contains("not enough balance"));
    }
}
