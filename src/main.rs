//! Polymarket Copy Trader - Main Entry Point
//!
//! Runs the monitor and executor loops side by side, with paper trading
//! against real order books unless live mode is explicitly enabled.

use anyhow::Result;
use clap::{Parser, Subcommand};
use polymarket_copy_trader::config::Config;
use polymarket_copy_trader::exchange::{
    AccountDataSource, ClobClient, DataApiClient, MockExchange, OrderClient, UsdcBalanceReader,
};
use polymarket_copy_trader::ledger::TradeLedger;
use polymarket_copy_trader::replication::{TradeExecutor, TradeMonitor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Polymarket Copy Trader CLI
#[derive(Parser)]
#[command(name = "polymarket-copy-trader")]
#[command(version, about = "Proportional copy trading on Polymarket")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show USDC balances of the tracked and bot wallets
    Balance,

    /// Show replication progress from the trade ledger
    Status {
        /// Path to the SQLite trade ledger (default: data/trades.db)
        #[arg(short, long, default_value = "data/trades.db")]
        db: String,
    },
}

/// Trading mode: Live (real orders) or Paper (simulated fills).
#[derive(Debug, Clone, Copy, PartialEq)]
enum TradingMode {
    Live,
    Paper,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    match cli.command {
        Some(Commands::Balance) => {
            return show_balances().await;
        }
        Some(Commands::Status { db }) => {
            return show_status(&db);
        }
        None => {
            // Default: run the copy trader
        }
    }

    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║         Polymarket Copy Trader v{}                      ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");

    // Determine trading mode from environment
    let trading_mode = if std::env::var("LIVE_TRADING").unwrap_or_default() == "true" {
        warn!("⚠️  LIVE TRADING MODE - Real money at risk!");
        TradingMode::Live
    } else {
        info!("📝 PAPER TRADING MODE - Simulated fills against live books");
        TradingMode::Paper
    };

    // Load and validate configuration
    let config = Config::load()?;
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {e:#}");
        return Err(e);
    }
    log_config(&config);

    // Initialize clients
    let data: Arc<dyn AccountDataSource> = Arc::new(DataApiClient::new(&config.api)?);
    let clob = Arc::new(ClobClient::new(&config.api, &config.wallets.proxy_address)?);
    let orders: Arc<dyn OrderClient> = match trading_mode {
        TradingMode::Live => {
            if config.api.api_key.is_empty() {
                warn!("⚠️  No CLOB credentials provided; order submission will fail");
            }
            clob
        }
        TradingMode::Paper => Arc::new(MockExchange::with_book_source(clob)),
    };

    // Open the trade ledger
    let ledger = Arc::new(TradeLedger::open(&config.ledger.db_path)?);
    let stats = ledger.stats()?;
    if stats.total > 0 {
        info!(
            "📂 Ledger restored: {} trades ({} pending, {} done)",
            stats.total, stats.pending, stats.done
        );
    }

    // Shutdown signal
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Shutdown signal received");
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    info!("🚀 Starting monitor and executor loops...");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let monitor = Arc::new(TradeMonitor::new(data.clone(), ledger.clone(), &config));
    let executor = Arc::new(TradeExecutor::new(data, orders, ledger.clone(), &config));

    let monitor_task = {
        let monitor = monitor.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { monitor.run(shutdown).await })
    };
    let executor_task = {
        let executor = executor.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { executor.run(shutdown).await })
    };

    let _ = tokio::join!(monitor_task, executor_task);

    let stats = ledger.stats()?;
    info!(
        "📊 Final ledger: {} trades ({} pending, {} done)",
        stats.total, stats.pending, stats.done
    );
    info!("👋 Polymarket Copy Trader shutdown complete");

    Ok(())
}

/// Initialize comprehensive logging with file output.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // File appender for detailed logs
    let file_appender = tracing_appender::rolling::hourly("logs", "copy-trader.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("polymarket_copy_trader=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Tracked Wallet:   {}", config.wallets.target_address);
    info!("   Bot Wallet:       {}", config.wallets.proxy_address);
    info!("   Fetch Interval:   {}s", config.monitor.fetch_interval_secs);
    info!(
        "   Max Trade Age:    {}h",
        config.monitor.max_trade_age_hours
    );
    info!("   Retry Limit:      {}", config.execution.retry_limit);
    info!(
        "   Price Tolerance:  {}",
        config.execution.price_tolerance
    );
    info!("   Ledger:           {}", config.ledger.db_path);
}

/// Show USDC balances of both wallets.
async fn show_balances() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let balances = UsdcBalanceReader::new(reqwest::Client::new(), config.api.rpc_url.clone());
    let target = balances.balance_of(&config.wallets.target_address).await?;
    let proxy = balances.balance_of(&config.wallets.proxy_address).await?;

    println!("💵 USDC Balances");
    println!(
        "   ├─ Tracked ({}): ${:.2}",
        config.wallets.target_address, target
    );
    println!(
        "   └─ Bot     ({}): ${:.2}",
        config.wallets.proxy_address, proxy
    );

    Ok(())
}

/// Show replication progress from the trade ledger.
fn show_status(db_path: &str) -> Result<()> {
    use std::path::Path;

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              COPY TRADER STATUS                            ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    if !Path::new(db_path).exists() {
        println!("\n❌ Database not found: {}", db_path);
        println!("   The copy trader has not been started yet, or the database path is incorrect.");
        return Ok(());
    }

    let ledger = TradeLedger::open(db_path)?;
    let stats = ledger.stats()?;

    println!("\n📊 Replication Progress");
    println!("   ├─ Recorded Trades:  {}", stats.total);
    println!("   ├─ Pending:          {}", stats.pending);
    println!("   └─ Completed:        {}", stats.done);

    let recent = ledger.recent(10)?;
    if !recent.is_empty() {
        println!("\n🕒 Recent Trades");
        for trade in &recent {
            let state = if trade.bot { "done" } else { "pending" };
            println!(
                "   ├─ {} {} {} @ {} [{}]",
                trade.transaction_hash, trade.side, trade.size, trade.price, state
            );
        }
    }

    Ok(())
}
