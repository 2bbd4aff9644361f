//! SQLite trade ledger.
//!
//! Records every trade observed on the tracked wallet and tracks its
//! replication lifecycle:
//! - `bot = 0` with `bot_executed_time` NULL or below the retry limit:
//!   eligible for execution
//! - `bot = 1`: terminal (replicated, skipped, or given up on)
//!
//! `bot_executed_time` counts consecutive failed submission attempts. It is
//! not cleared when a trade completes, so a terminal row still shows how
//! many rejections it survived.

use crate::exchange::types::Activity;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, info};

/// One observed trade of the tracked wallet, as persisted.
#[derive(Debug, Clone)]
pub struct TradeRecord {
    pub transaction_hash: String,
    pub activity_type: String,
    pub condition_id: String,
    pub asset: String,
    pub side: String,
    pub size: Decimal,
    pub usdc_size: Decimal,
    pub price: Decimal,
    pub timestamp: i64,
    pub proxy_wallet: String,
    /// 1 once the record is terminal.
    pub bot: bool,
    /// Consecutive failed submission attempts; fresh records start at 0.
    pub attempts: Option<u32>,
}

impl TradeRecord {
    /// Build a fresh (not yet executed) record from a Data API activity.
    pub fn from_activity(activity: &Activity, proxy_wallet: &str) -> Self {
        Self {
            transaction_hash: activity.transaction_hash.clone(),
            activity_type: activity.activity_type.as_str().to_string(),
            condition_id: activity.condition_id.clone(),
            asset: activity.asset.clone(),
            side: activity.side.clone(),
            size: activity.size,
            usdc_size: activity.usdc_size,
            price: activity.price,
            timestamp: activity.timestamp,
            proxy_wallet: proxy_wallet.to_string(),
            bot: false,
            attempts: Some(0),
        }
    }
}

/// Replication progress counts for the status report.
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerStats {
    pub total: usize,
    pub pending: usize,
    pub done: usize,
}

/// SQLite-backed trade ledger.
///
/// The connection is wrapped in a `Mutex` so the monitor and executor tasks
/// can share one handle; all methods are synchronous and never hold the
/// lock across an await point.
pub struct TradeLedger {
    conn: Mutex<Connection>,
}

impl TradeLedger {
    /// Open (or create) the ledger database and initialize the schema.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
        }

        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        let ledger = Self {
            conn: Mutex::new(conn),
        };
        ledger.init_schema()?;

        info!("Trade ledger opened at {:?}", db_path.as_ref());
        Ok(ledger)
    }

    /// In-memory ledger for tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let ledger = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        ledger.init_schema()?;
        Ok(ledger)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().expect("ledger lock poisoned");
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                transaction_hash TEXT PRIMARY KEY,
                activity_type TEXT NOT NULL,
                condition_id TEXT NOT NULL,
                asset TEXT NOT NULL,
                side TEXT NOT NULL,
                size TEXT NOT NULL,
                usdc_size TEXT NOT NULL,
                price TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                proxy_wallet TEXT NOT NULL,
                bot INTEGER NOT NULL DEFAULT 0,
                bot_executed_time INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_trades_pending ON trades(bot, timestamp);
            "#,
        )?;

        debug!("Ledger schema initialized");
        Ok(())
    }

    /// Insert a record, keyed by transaction hash. Returns `false` when the
    /// hash is already known (the row is left untouched).
    pub fn insert(&self, record: &TradeRecord) -> Result<bool> {
        let conn = self.conn.lock().expect("ledger lock poisoned");
        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO trades (transaction_hash, activity_type, condition_id,
                                          asset, side, size, usdc_size, price, timestamp,
                                          proxy_wallet, bot, bot_executed_time)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                record.transaction_hash,
                record.activity_type,
                record.condition_id,
                record.asset,
                record.side,
                record.size.to_string(),
                record.usdc_size.to_string(),
                record.price.to_string(),
                record.timestamp,
                record.proxy_wallet,
                record.bot as i32,
                record.attempts,
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Transaction hashes of every recorded trade, for monitor deduplication.
    pub fn existing_hashes(&self) -> Result<HashSet<String>> {
        let conn = self.conn.lock().expect("ledger lock poisoned");
        let mut stmt = conn.prepare("SELECT transaction_hash FROM trades")?;
        let hashes = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(hashes)
    }

    /// Trades still awaiting replication: TRADE rows that are not terminal
    /// and have not exhausted the retry budget, oldest first.
    pub fn eligible(&self, retry_limit: u32) -> Result<Vec<TradeRecord>> {
        let conn = self.conn.lock().expect("ledger lock poisoned");
        let mut stmt = conn.prepare(
            r#"
            SELECT transaction_hash, activity_type, condition_id, asset, side,
                   size, usdc_size, price, timestamp, proxy_wallet, bot, bot_executed_time
            FROM trades
            WHERE activity_type = 'TRADE'
              AND bot = 0
              AND (bot_executed_time IS NULL OR bot_executed_time < ?1)
            ORDER BY timestamp ASC
            "#,
        )?;

        let records = stmt
            .query_map([retry_limit], |row| {
                Ok(TradeRecord {
                    transaction_hash: row.get(0)?,
                    activity_type: row.get(1)?,
                    condition_id: row.get(2)?,
                    asset: row.get(3)?,
                    side: row.get(4)?,
                    size: decimal_column(row, 5)?,
                    usdc_size: decimal_column(row, 6)?,
                    price: decimal_column(row, 7)?,
                    timestamp: row.get(8)?,
                    proxy_wallet: row.get(9)?,
                    bot: row.get::<_, i32>(10)? != 0,
                    attempts: row.get(11)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Mark a trade terminal after successful (or intentionally skipped)
    /// replication. The attempt counter is left as-is.
    pub fn mark_done(&self, transaction_hash: &str) -> Result<()> {
        let conn = self.conn.lock().expect("ledger lock poisoned");
        conn.execute(
            "UPDATE trades SET bot = 1 WHERE transaction_hash = ?1",
            params![transaction_hash],
        )?;
        Ok(())
    }

    /// Mark a trade terminal after giving up, recording how many attempts
    /// were spent.
    pub fn mark_failed(&self, transaction_hash: &str, attempts: u32) -> Result<()> {
        let conn = self.conn.lock().expect("ledger lock poisoned");
        conn.execute(
            "UPDATE trades SET bot = 1, bot_executed_time = ?2 WHERE transaction_hash = ?1",
            params![transaction_hash, attempts],
        )?;
        Ok(())
    }

    /// Most recently observed trades, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<TradeRecord>> {
        let conn = self.conn.lock().expect("ledger lock poisoned");
        let mut stmt = conn.prepare(
            r#"
            SELECT transaction_hash, activity_type, condition_id, asset, side,
                   size, usdc_size, price, timestamp, proxy_wallet, bot, bot_executed_time
            FROM trades
            ORDER BY timestamp DESC
            LIMIT ?1
            "#,
        )?;

        let records = stmt
            .query_map([limit], |row| {
                Ok(TradeRecord {
                    transaction_hash: row.get(0)?,
                    activity_type: row.get(1)?,
                    condition_id: row.get(2)?,
                    asset: row.get(3)?,
                    side: row.get(4)?,
                    size: decimal_column(row, 5)?,
                    usdc_size: decimal_column(row, 6)?,
                    price: decimal_column(row, 7)?,
                    timestamp: row.get(8)?,
                    proxy_wallet: row.get(9)?,
                    bot: row.get::<_, i32>(10)? != 0,
                    attempts: row.get(11)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Replication progress counts.
    pub fn stats(&self) -> Result<LedgerStats> {
        let conn = self.conn.lock().expect("ledger lock poisoned");
        let (total, done): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(bot), 0) FROM trades",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(LedgerStats {
            total: total as usize,
            done: done as usize,
            pending: (total - done) as usize,
        })
    }
}

fn decimal_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(tx: &str, ts: i64) -> TradeRecord {
        TradeRecord {
            transaction_hash: tx.to_string(),
            activity_type: "TRADE".to_string(),
            condition_id: "0xcond".to_string(),
            asset: "1234".to_string(),
            side: "BUY".to_string(),
            size: dec!(100),
            usdc_size: dec!(50),
            price: dec!(0.5),
            timestamp: ts,
            proxy_wallet: "0xsource".to_string(),
            bot: false,
            attempts: None,
        }
    }

    #[test]
    fn test_insert_is_idempotent_per_hash() {
        let ledger = TradeLedger::open_in_memory().unwrap();

        assert!(ledger.insert(&record("0xabc", 100)).unwrap());
        // Same hash again, even with different fields, is a no-op
        let mut dup = record("0xabc", 999);
        dup.size = dec!(1);
        assert!(!ledger.insert(&dup).unwrap());

        let rows = ledger.eligible(3).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, 100);
        assert_eq!(rows[0].size, dec!(100));
    }

    #[test]
    fn test_eligible_filters_terminal_and_exhausted() {
        let ledger = TradeLedger::open_in_memory().unwrap();
        ledger.insert(&record("0xdone", 1)).unwrap();
        ledger.insert(&record("0xfailed", 2)).unwrap();
        ledger.insert(&record("0xretrying", 3)).unwrap();
        ledger.insert(&record("0xfresh", 4)).unwrap();

        ledger.mark_done("0xdone").unwrap();
        ledger.mark_failed("0xfailed", 3).unwrap();

        let eligible = ledger.eligible(3).unwrap();
        let hashes: Vec<_> = eligible
            .iter()
            .map(|r| r.transaction_hash.as_str())
            .collect();
        assert_eq!(hashes, vec!["0xretrying", "0xfresh"]);
    }

    #[test]
    fn test_non_trade_rows_are_recorded_but_never_eligible() {
        let ledger = TradeLedger::open_in_memory().unwrap();
        let mut merge = record("0xmerge", 5);
        merge.activity_type = "MERGE".to_string();
        ledger.insert(&merge).unwrap();

        assert!(ledger.eligible(3).unwrap().is_empty());
        assert!(ledger.existing_hashes().unwrap().contains("0xmerge"));
    }

    #[test]
    fn test_mark_failed_is_terminal_and_records_attempts() {
        let ledger = TradeLedger::open_in_memory().unwrap();
        ledger.insert(&record("0xabc", 1)).unwrap();
        ledger.mark_failed("0xabc", 2).unwrap();

        // Failed trades are terminal no matter the configured limit
        assert!(ledger.eligible(2).unwrap().is_empty());
        assert!(ledger.eligible(100).unwrap().is_empty());

        // The spent attempts stay visible for audit
        let recent = ledger.recent(1).unwrap();
        assert!(recent[0].bot);
        assert_eq!(recent[0].attempts, Some(2));
    }

    #[test]
    fn test_stats_counts() {
        let ledger = TradeLedger::open_in_memory().unwrap();
        ledger.insert(&record("0xa", 1)).unwrap();
        ledger.insert(&record("0xb", 2)).unwrap();
        ledger.insert(&record("0xc", 3)).unwrap();
        ledger.mark_done("0xa").unwrap();

        let stats = ledger.stats().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.done, 1);
        assert_eq!(stats.pending, 2);
    }

    #[test]
    fn test_recent_is_newest_first_and_bounded() {
        let ledger = TradeLedger::open_in_memory().unwrap();
        ledger.insert(&record("0xold", 1)).unwrap();
        ledger.insert(&record("0xmid", 2)).unwrap();
        ledger.insert(&record("0xnew", 3)).unwrap();

        let recent = ledger.recent(2).unwrap();
        let hashes: Vec<_> = recent.iter().map(|r| r.transaction_hash.as_str()).collect();
        assert_eq!(hashes, vec!["0xnew", "0xmid"]);
    }

    #[test]
    fn test_record_from_activity() {
        let activity: crate::exchange::types::Activity = serde_json::from_str(
            r#"{
                "type": "TRADE",
                "transactionHash": "0xabc",
                "conditionId": "0xcond",
                "asset": "1234",
                "side": "SELL",
                "size": 20,
                "usdcSize": 8,
                "price": 0.4,
                "timestamp": 1700000000
            }"#,
        )
        .unwrap();

        let record = TradeRecord::from_activity(&activity, "0xsource");
        assert_eq!(record.activity_type, "TRADE");
        assert_eq!(record.side, "SELL");
        assert!(!record.bot);
        assert_eq!(record.attempts, Some(0));
    }
}
