//! The replication engine: trade discovery, execution, and order sizing.

pub mod executor;
pub mod monitor;
pub mod replicator;

pub use executor::{Intent, TradeExecutor};
pub use monitor::TradeMonitor;
pub use replicator::{AbortReason, ReplicationOutcome, Replicator};
