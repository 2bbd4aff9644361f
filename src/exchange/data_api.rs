//! Polymarket Data API client.
//!
//! Read-only access to account activity and positions, plus on-chain USDC
//! balance reads. Collection fetches go through a bounded-retry helper that
//! degrades to an empty result on exhaustion, so the polling loops never
//! die on a flaky network.

use crate::config::ApiConfig;
use crate::exchange::onchain::UsdcBalanceReader;
use crate::exchange::traits::AccountDataSource;
use crate::exchange::types::{Activity, PositionSnapshot};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const FETCH_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const BACKOFF_FACTOR: f64 = 1.5;

/// HTTP client for the Polymarket Data API.
pub struct DataApiClient {
    http: Client,
    base_url: String,
    balances: UsdcBalanceReader,
    retries: u32,
    initial_backoff: Duration,
}

impl DataApiClient {
    /// Create a new client from configuration.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            balances: UsdcBalanceReader::new(http.clone(), config.rpc_url.clone()),
            http,
            base_url: config.data_api_url.trim_end_matches('/').to_string(),
            retries: FETCH_RETRIES,
            initial_backoff: INITIAL_BACKOFF,
        })
    }

    /// Override request timing (mainly for tests against a local server).
    pub fn with_timing(mut self, timeout: Duration, initial_backoff: Duration) -> Result<Self> {
        self.http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        self.initial_backoff = initial_backoff;
        Ok(self)
    }

    /// GET a JSON collection with bounded retry and capped backoff.
    ///
    /// Only transport-level failures (timeout, connect) are retried; a bad
    /// status or malformed body gives up immediately. Either way the caller
    /// sees an empty collection, never an error.
    async fn get_collection<T: DeserializeOwned>(&self, url: &str) -> Vec<T> {
        let mut backoff = self.initial_backoff;

        for attempt in 1..=self.retries {
            let response = match self.http.get(url).send().await {
                Ok(response) => response,
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < self.retries => {
                    warn!(%url, attempt, error = %e, "Transient fetch failure, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.mul_f64(BACKOFF_FACTOR);
                    continue;
                }
                Err(e) => {
                    warn!(%url, attempt, error = %e, "Fetch failed, returning empty batch");
                    return Vec::new();
                }
            };

            if !response.status().is_success() {
                warn!(%url, status = %response.status(), "Fetch rejected, returning empty batch");
                return Vec::new();
            }

            match response.json::<Vec<T>>().await {
                Ok(items) => {
                    debug!(%url, count = items.len(), "Fetched collection");
                    return items;
                }
                Err(e) => {
                    warn!(%url, error = %e, "Malformed response body, returning empty batch");
                    return Vec::new();
                }
            }
        }

        Vec::new()
    }
}

#[async_trait]
impl AccountDataSource for DataApiClient {
    async fn recent_activity(&self, user: &str) -> Vec<Activity> {
        let url = format!("{}/activities?user={}", self.base_url, user);
        self.get_collection(&url).await
    }

    async fn positions(&self, user: &str) -> Vec<PositionSnapshot> {
        let url = format!("{}/positions?user={}", self.base_url, user);
        self.get_collection(&url).await
    }

    async fn usdc_balance(&self, user: &str) -> Result<Decimal> {
        self.balances.balance_of(user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::types::ActivityType;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> ApiConfig {
        ApiConfig {
            data_api_url: server.uri(),
            rpc_url: server.uri(),
            ..ApiConfig::default()
        }
    }

    #[tokio::test]
    async fn test_recent_activity_parses_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/activities"))
            .and(query_param("user", "0xsource"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "type": "TRADE",
                "transactionHash": "0xabc",
                "conditionId": "0xcond",
                "asset": "777",
                "side": "BUY",
                "size": 50.0,
                "usdcSize": 30.0,
                "price": 0.6,
                "timestamp": 1700000000
            }])))
            .mount(&server)
            .await;

        let client = DataApiClient::new(&test_config(&server)).unwrap();
        let activities = client.recent_activity("0xsource").await;
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].activity_type, ActivityType::Trade);
        assert_eq!(activities[0].transaction_hash, "0xabc");
    }

    #[tokio::test]
    async fn test_server_error_yields_empty_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/positions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = DataApiClient::new(&test_config(&server)).unwrap();
        let positions = client.positions("0xsource").await;
        assert!(positions.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_yields_empty_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/activities"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = DataApiClient::new(&test_config(&server)).unwrap();
        let activities = client.recent_activity("0xsource").await;
        assert!(activities.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_exhausts_retries_then_yields_empty_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/activities"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([]))
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(3)
            .mount(&server)
            .await;

        let client = DataApiClient::new(&test_config(&server))
            .unwrap()
            .with_timing(Duration::from_millis(50), Duration::from_millis(10))
            .unwrap();
        let activities = client.recent_activity("0xsource").await;
        assert!(activities.is_empty());
    }
}
