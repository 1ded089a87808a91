//! Vantage Daemon
//!
//! Market state engine for the trading dashboard: reconciles REST
//! snapshots with the exchange push stream and keeps precision-correct
//! order/position views.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration
//! cargo run -p vantaged
//!
//! # Start against the futures testnet
//! VANTAGE_TESTNET=1 VANTAGE_SYMBOLS=BTCUSDT,ETHUSDT cargo run -p vantaged
//! ```
//!
//! # Environment Variables
//!
//! - `VANTAGE_ENV`: Environment (test, development, production)
//! - `VANTAGE_API_KEY` / `VANTAGE_API_SECRET`: Exchange credentials
//! - `VANTAGE_TESTNET`: Use the futures testnet (default: false)
//! - `VANTAGE_SYMBOLS`: Comma-separated mark-price symbols (default: BTCUSDT)
//! - `VANTAGE_POLL_INTERVAL_SECS`: Snapshot poll interval (default: 30)
//! - `VANTAGE_ORDER_LIMIT`: Order view row limit (default: 50)

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vantaged::{Config, Daemon};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("vantaged=info".parse()?))
        .init();

    // Load configuration
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        testnet = config.exchange.testnet,
        symbols = config.symbols.len(),
        "Vantage Daemon"
    );

    // Create and run daemon
    let daemon = Daemon::new(config);
    daemon.run().await?;

    Ok(())
}
