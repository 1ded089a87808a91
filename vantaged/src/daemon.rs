//! Daemon wiring: connects the exchange adapters to the market state.
//!
//! One task owns the `MarketState` and drains a single message channel;
//! the WebSocket clients and the snapshot poll feed it. Stream events keep
//! arriving while a poll is awaited, which is exactly the interleaving the
//! scoped snapshot merge is built for.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep};
use tracing::{error, info, warn};

use vantage_connectors::{BinanceRestClient, BinanceStreamClient, StreamMessage};
use vantage_domain::Symbol;

use crate::config::Config;
use crate::error::DaemonResult;
use crate::market_state::MarketState;

/// Listen-key keepalive period (Binance expires keys after 60 minutes).
const LISTEN_KEY_KEEPALIVE_SECS: u64 = 1800;

/// Longest reconnect backoff exponent (0.5s << 6 = 32s).
const MAX_BACKOFF_SHIFT: u32 = 6;

/// The Vantage daemon.
pub struct Daemon {
    config: Config,
}

impl Daemon {
    /// Create a daemon from configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until the process is stopped.
    pub async fn run(self) -> DaemonResult<()> {
        let exchange = &self.config.exchange;
        let rest = Arc::new(if exchange.testnet {
            BinanceRestClient::testnet(exchange.api_key.clone(), exchange.api_secret.clone())
        } else {
            BinanceRestClient::new(exchange.api_key.clone(), exchange.api_secret.clone())
        });

        let mut state: MarketState<BinanceRestClient, BinanceRestClient> =
            MarketState::new(rest.clone(), rest.clone(), self.config.order_limit);

        // A failed bootstrap is not fatal: the poll loop retries, and until
        // then the engine serves default rules and empty books.
        if let Err(err) = state.bootstrap().await {
            warn!(%err, "bootstrap incomplete, continuing with last known state");
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let ws_base = BinanceStreamClient::default_ws_base(exchange.testnet).to_string();

        let _user_stream = spawn_user_stream(rest.clone(), ws_base.clone(), tx.clone());
        let _keepalive = spawn_listen_key_keepalive(rest.clone());
        let _mark_streams: Vec<JoinHandle<()>> = self
            .config
            .symbols
            .iter()
            .cloned()
            .map(|symbol| spawn_mark_price_stream(ws_base.clone(), symbol, tx.clone()))
            .collect();

        let mut poll = interval(Duration::from_secs(self.config.poll_interval_secs));

        loop {
            tokio::select! {
                Some(message) = rx.recv() => {
                    state.handle_stream_message(message);
                }
                _ = poll.tick() => {
                    if let Err(err) = state.refresh_orders().await {
                        warn!(%err, "order poll failed");
                    }
                    if let Err(err) = state.refresh_positions().await {
                        warn!(%err, "position poll failed");
                    }
                }
            }
        }
    }
}

/// Exponential reconnect backoff.
fn backoff_delay(attempt: u32) -> Duration {
    let shift = attempt.min(MAX_BACKOFF_SHIFT);
    Duration::from_millis(500u64 << shift)
}

/// Spawn the user-data stream task (orders + positions).
///
/// Reconnects with exponential backoff, fetching a fresh listen key each
/// time; the poll loop re-snapshots whatever was missed while disconnected.
fn spawn_user_stream(
    rest: Arc<BinanceRestClient>,
    ws_base: String,
    tx: mpsc::UnboundedSender<StreamMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut attempt: u32 = 0;
        loop {
            match rest.create_listen_key().await {
                Ok(listen_key) => {
                    match BinanceStreamClient::connect_user(&ws_base, &listen_key, tx.clone()).await
                    {
                        Ok(mut client) => {
                            attempt = 0;
                            info!("user stream connected");
                            if let Err(err) = client.run().await {
                                error!(%err, "user stream ended");
                            }
                        }
                        Err(err) => error!(%err, "user stream connect failed"),
                    }
                }
                Err(err) => error!(%err, "listen key request failed"),
            }

            if tx.is_closed() {
                return;
            }
            attempt = attempt.saturating_add(1);
            sleep(backoff_delay(attempt)).await;
        }
    })
}

/// Spawn the listen-key keepalive task.
fn spawn_listen_key_keepalive(rest: Arc<BinanceRestClient>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(LISTEN_KEY_KEEPALIVE_SECS));
        // First tick fires immediately; skip it.
        tick.tick().await;
        loop {
            tick.tick().await;
            if let Err(err) = rest.keepalive_listen_key().await {
                warn!(%err, "listen key keepalive failed");
            }
        }
    })
}

/// Spawn a mark-price stream task for one symbol.
fn spawn_mark_price_stream(
    ws_base: String,
    symbol: Symbol,
    tx: mpsc::UnboundedSender<StreamMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut attempt: u32 = 0;
        loop {
            match BinanceStreamClient::connect_mark_price(&ws_base, &symbol, tx.clone()).await {
                Ok(mut client) => {
                    attempt = 0;
                    info!(%symbol, "mark price stream connected");
                    if let Err(err) = client.run().await {
                        error!(%err, %symbol, "mark price stream ended");
                    }
                }
                Err(err) => error!(%err, %symbol, "mark price connect failed"),
            }

            if tx.is_closed() {
                return;
            }
            attempt = attempt.saturating_add(1);
            sleep(backoff_delay(attempt)).await;
        }
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_caps_at_32_seconds() {
        assert_eq!(backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(6), Duration::from_millis(32000));
        assert_eq!(backoff_delay(60), Duration::from_millis(32000));
    }
}
