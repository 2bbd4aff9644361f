//! Polymarket connectivity: Data API reads, CLOB order flow, on-chain
//! balance lookups, and an in-memory mock for paper trading and tests.

pub mod clob;
pub mod data_api;
pub mod mock;
pub mod onchain;
pub mod traits;
pub mod types;

pub use clob::ClobClient;
pub use data_api::DataApiClient;
pub use mock::MockExchange;
pub use onchain::UsdcBalanceReader;
pub use traits::{AccountDataSource, OrderClient};
pub use types::{
    Activity, ActivityType, BookLevel, MarketOrderArgs, OrderBook, OrderResponse, OrderSide,
    PositionSnapshot, SignedOrder,
};
