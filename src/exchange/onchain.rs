//! On-chain USDC balance reads via JSON-RPC.
//!
//! Free capital is the wallet's USDC balance on Polygon. This is a plain
//! `eth_call` against the token contract's `balanceOf(address)`; no wallet
//! or signing machinery is involved.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// USDC (PoS) contract on Polygon.
const USDC_ADDRESS: &str = "0x2791bca1f2de4661ed88a30c99a7a9449aa84174";
/// `balanceOf(address)` selector.
const BALANCE_OF_SELECTOR: &str = "0x70a08231";
/// USDC uses 6 decimals.
const USDC_DECIMALS: u32 = 6;
/// Largest raw balance `Decimal` can carry (96-bit mantissa).
const MAX_RAW_UNITS: u128 = (1 << 96) - 1;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Minimal JSON-RPC reader for USDC balances.
pub struct UsdcBalanceReader {
    http: Client,
    rpc_url: String,
}

impl UsdcBalanceReader {
    pub fn new(http: Client, rpc_url: String) -> Self {
        Self { http, rpc_url }
    }

    /// Free USDC balance of `address`, in whole USDC.
    pub async fn balance_of(&self, address: &str) -> Result<Decimal> {
        let data = format!("{}{}", BALANCE_OF_SELECTOR, pad_address(address)?);

        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [{"to": USDC_ADDRESS, "data": data}, "latest"],
        });

        let response: RpcResponse = self
            .http
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .context("Failed to reach RPC endpoint")?
            .json()
            .await
            .context("Failed to parse RPC response")?;

        if let Some(err) = response.error {
            return Err(anyhow!("RPC error {}: {}", err.code, err.message));
        }

        let raw = response
            .result
            .ok_or_else(|| anyhow!("RPC response missing result"))?;
        let units = parse_hex_quantity(&raw)?;
        let balance = Decimal::from_i128_with_scale(units as i128, USDC_DECIMALS);

        debug!(%address, %balance, "Fetched USDC balance");
        Ok(balance)
    }
}

/// Left-pad a 20-byte hex address to a 32-byte ABI word.
fn pad_address(address: &str) -> Result<String> {
    let stripped = address
        .strip_prefix("0x")
        .unwrap_or(address)
        .to_ascii_lowercase();
    // Reject malformed addresses before they reach the RPC node
    hex::decode(&stripped).context("Address is not valid hex")?;
    anyhow::ensure!(stripped.len() == 40, "Address must be 20 bytes");
    Ok(format!("{:0>64}", stripped))
}

/// Parse an `0x`-prefixed hex quantity, bounded to `Decimal`'s mantissa
/// range so a misbehaving RPC node errors instead of wrapping.
fn parse_hex_quantity(raw: &str) -> Result<u128> {
    let stripped = raw.strip_prefix("0x").unwrap_or(raw);
    if stripped.is_empty() {
        return Ok(0);
    }
    let units = u128::from_str_radix(stripped, 16)
        .with_context(|| format!("Invalid hex quantity in RPC result: {raw}"))?;
    anyhow::ensure!(
        units <= MAX_RAW_UNITS,
        "RPC balance {units} exceeds the representable range"
    );
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_pad_address() {
        let padded = pad_address("0xAb00000000000000000000000000000000000001").unwrap();
        assert_eq!(padded.len(), 64);
        assert!(padded.starts_with("000000000000000000000000ab"));
        assert!(pad_address("0x1234").is_err());
        assert!(pad_address("not-hex").is_err());
    }

    #[test]
    fn test_parse_hex_quantity() {
        assert_eq!(parse_hex_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_hex_quantity("0x2faf080").unwrap(), 50_000_000);
        assert!(parse_hex_quantity("0xzz").is_err());
    }

    #[test]
    fn test_parse_hex_quantity_rejects_oversized_balances() {
        // 2^96 - 1 is the last value the decimal type can hold
        assert_eq!(
            parse_hex_quantity("0xffffffffffffffffffffffff").unwrap(),
            MAX_RAW_UNITS
        );
        // 2^96 and anything larger must error, not wrap
        assert!(parse_hex_quantity("0x1000000000000000000000000").is_err());
        assert!(parse_hex_quantity(&format!("0x{}", "f".repeat(32))).is_err());
    }

    #[tokio::test]
    async fn test_balance_of_scales_to_whole_usdc() {
        let server = MockServer::start().await;
        // 50_000_000 raw units = 50 USDC
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": "0x0000000000000000000000000000000000000000000000000000000002faf080"
            })))
            .mount(&server)
            .await;

        let reader = UsdcBalanceReader::new(Client::new(), server.uri());
        let balance = reader
            .balance_of("0xab00000000000000000000000000000000000001")
            .await
            .unwrap();
        assert_eq!(balance, dec!(50));
    }

    #[tokio::test]
    async fn test_rpc_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32000, "message": "execution reverted"}
            })))
            .mount(&server)
            .await;

        let reader = UsdcBalanceReader::new(Client::new(), server.uri());
        let result = reader
            .balance_of("0xab00000000000000000000000000000000000001")
            .await;
        assert!(result.is_err());
    }
}
