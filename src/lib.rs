//! # Polymarket Copy Trader
//!
//! A Rust service that mirrors a source Polymarket account's trades
//! proportionally into a second, bot-controlled account.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `exchange`: Polymarket Data API / CLOB clients and the paper-trading mock
//! - `ledger`: SQLite-backed durable queue of discovered source trades
//! - `replication`: Trade monitor (producer), trade executor (consumer), and
//!   the order replicator that works sized orders against live book depth
//! - `utils`: Shared decimal arithmetic helpers

pub mod config;
pub mod exchange;
pub mod ledger;
pub mod replication;
pub mod utils;

pub use config::Config;
