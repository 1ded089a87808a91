//! Binance USDⓈ-M Futures WebSocket Stream Client
//!
//! Parses push messages into a tagged union and forwards them to the
//! engine. Only order updates, account (position) updates, and mark-price
//! ticks are meaningful; every other message kind maps to
//! `StreamMessage::Ignored` and never reaches store state.

use futures_util::stream::StreamExt;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message as WebSocketMessage, WebSocketStream};
use tracing::{debug, error, info, warn};

use vantage_domain::{
    MarkPriceTick, OrderPatch, OrderSide, OrderStatus, OrderType, PositionPatch, Side, Symbol,
};

use crate::error::ConnectorError;

/// Type alias for the WebSocket stream (with auto TLS).
type WsStream = WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Binance futures WebSocket base URL.
const FUTURES_WS_URL: &str = "wss://fstream.binance.com/ws";

/// Binance futures testnet WebSocket base URL.
const FUTURES_TESTNET_WS_URL: &str = "wss://stream.binancefuture.com/ws";

/// WebSocket read timeout (in seconds).
const READ_TIMEOUT_SECS: u64 = 180;

// =============================================================================
// Stream messages
// =============================================================================

/// A parsed stream message.
///
/// The engine consumes exactly three kinds; everything else the exchange
/// pushes (account config changes, margin calls, listen-key expiry, ...)
/// is `Ignored` — present so routing stays total, but a guaranteed no-op.
#[derive(Debug, Clone)]
pub enum StreamMessage {
    /// An order changed (new, fill, cancel, ...)
    OrderUpdate(OrderTradeUpdateEvent),
    /// Positions changed (fills, margin adjustments)
    AccountUpdate(AccountUpdateEvent),
    /// Mark-price tick
    MarkPrice(MarkPriceEvent),
    /// Any other message kind
    Ignored,
}

/// Parse one stream text frame.
///
/// Malformed JSON is an error; well-formed JSON with an unknown `"e"` tag
/// is `Ignored`, never an error.
pub fn parse_stream_message(text: &str) -> Result<StreamMessage, ConnectorError> {
    let json: Value =
        serde_json::from_str(text).map_err(|e| ConnectorError::Parse(e.to_string()))?;

    let kind = json.get("e").and_then(|v| v.as_str());
    match kind {
        Some("ORDER_TRADE_UPDATE") => serde_json::from_value(json)
            .map(StreamMessage::OrderUpdate)
            .map_err(|e| ConnectorError::Parse(format!("Invalid order update: {}", e))),
        Some("ACCOUNT_UPDATE") => serde_json::from_value(json)
            .map(StreamMessage::AccountUpdate)
            .map_err(|e| ConnectorError::Parse(format!("Invalid account update: {}", e))),
        Some("markPriceUpdate") => serde_json::from_value(json)
            .map(StreamMessage::MarkPrice)
            .map_err(|e| ConnectorError::Parse(format!("Invalid mark price update: {}", e))),
        _ => Ok(StreamMessage::Ignored),
    }
}

// =============================================================================
// ORDER_TRADE_UPDATE
// =============================================================================

/// Envelope of an `ORDER_TRADE_UPDATE` event.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderTradeUpdateEvent {
    /// Event time (epoch milliseconds)
    #[serde(rename = "E")]
    pub event_time: i64,
    /// Order payload
    #[serde(rename = "o")]
    pub order: OrderTradeUpdate,
}

/// Order payload of an `ORDER_TRADE_UPDATE` event.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderTradeUpdate {
    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,
    /// Exchange order id
    #[serde(rename = "i")]
    pub order_id: i64,
    /// Order side
    #[serde(rename = "S")]
    pub side: OrderSide,
    /// Order type
    #[serde(rename = "o")]
    pub order_type: OrderType,
    /// Order status after this event
    #[serde(rename = "X")]
    pub status: String,
    /// Original quantity
    #[serde(rename = "q", default)]
    pub orig_qty: Option<Decimal>,
    /// Cumulative filled quantity
    #[serde(rename = "z", default)]
    pub executed_qty: Option<Decimal>,
    /// Average fill price
    #[serde(rename = "ap", default)]
    pub avg_price: Option<Decimal>,
    /// Limit price
    #[serde(rename = "p", default)]
    pub price: Option<Decimal>,
    /// Reduce-only flag
    #[serde(rename = "R", default)]
    pub reduce_only: Option<bool>,
    /// Close-position flag
    #[serde(rename = "cp", default)]
    pub close_position: Option<bool>,
    /// Realized profit of the trade
    #[serde(rename = "rp", default)]
    pub realized_profit: Option<Decimal>,
    /// Order trade time (epoch milliseconds)
    #[serde(rename = "T", default)]
    pub trade_time: Option<i64>,
}

impl OrderTradeUpdateEvent {
    /// Convert to the domain patch this event carries.
    pub fn to_patch(&self) -> Result<OrderPatch, ConnectorError> {
        let order = &self.order;
        let symbol =
            Symbol::new(order.symbol.clone()).map_err(|e| ConnectorError::Parse(e.to_string()))?;
        let status = OrderStatus::from_exchange(&order.status)
            .map_err(|e| ConnectorError::Parse(e.to_string()))?;

        Ok(OrderPatch {
            order_id: order.order_id,
            symbol,
            side: order.side,
            order_type: order.order_type,
            status,
            orig_qty: order.orig_qty,
            executed_qty: order.executed_qty,
            avg_price: order.avg_price,
            price: order.price,
            reduce_only: order.reduce_only,
            close_position: order.close_position,
            realized_profit: order.realized_profit,
            update_time: order.trade_time.or(Some(self.event_time)),
        })
    }
}

// =============================================================================
// ACCOUNT_UPDATE
// =============================================================================

/// Envelope of an `ACCOUNT_UPDATE` event.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountUpdateEvent {
    /// Event time (epoch milliseconds)
    #[serde(rename = "E")]
    pub event_time: i64,
    /// Update payload
    #[serde(rename = "a")]
    pub data: AccountUpdateData,
}

/// Payload of an `ACCOUNT_UPDATE` event.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountUpdateData {
    /// Changed positions
    #[serde(rename = "P", default)]
    pub positions: Vec<AccountPosition>,
}

/// One changed position inside an `ACCOUNT_UPDATE` event.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountPosition {
    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,
    /// Position amount (signed)
    #[serde(rename = "pa")]
    pub position_amt: Decimal,
    /// Entry price
    #[serde(rename = "ep", default)]
    pub entry_price: Option<Decimal>,
    /// Isolated wallet (margin)
    #[serde(rename = "iw", default)]
    pub isolated_wallet: Option<Decimal>,
    /// Position side ("LONG", "SHORT", or "BOTH" in one-way mode)
    #[serde(rename = "ps")]
    pub position_side: String,
}

impl AccountUpdateEvent {
    /// Convert to the domain patches this event carries, one per changed
    /// position. Entries that cannot be mapped are skipped with a warning
    /// rather than failing the whole event.
    pub fn position_patches(&self) -> Vec<PositionPatch> {
        self.data
            .positions
            .iter()
            .filter_map(|entry| match entry.to_patch() {
                Ok(patch) => Some(patch),
                Err(err) => {
                    warn!(symbol = %entry.symbol, %err, "skipping unmappable position entry");
                    None
                }
            })
            .collect()
    }
}

impl AccountPosition {
    fn to_patch(&self) -> Result<PositionPatch, ConnectorError> {
        let symbol =
            Symbol::new(self.symbol.clone()).map_err(|e| ConnectorError::Parse(e.to_string()))?;

        // One-way accounts report "BOTH"; the sign of the amount carries
        // the direction in that case.
        let side = match self.position_side.as_str() {
            "LONG" => Side::Long,
            "SHORT" => Side::Short,
            _ if self.position_amt < Decimal::ZERO => Side::Short,
            _ => Side::Long,
        };

        Ok(PositionPatch {
            symbol,
            side,
            quantity: Some(self.position_amt.abs()),
            entry_price: self.entry_price,
            margin: self.isolated_wallet,
            leverage: None,
            stop_loss: None,
            take_profit: None,
        })
    }
}

// =============================================================================
// markPriceUpdate
// =============================================================================

/// A `markPriceUpdate` event.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkPriceEvent {
    /// Event time (epoch milliseconds)
    #[serde(rename = "E")]
    pub event_time: i64,
    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,
    /// Mark price
    #[serde(rename = "p")]
    pub mark_price: Decimal,
}

impl MarkPriceEvent {
    /// Convert to the domain tick.
    pub fn to_tick(&self) -> Result<MarkPriceTick, ConnectorError> {
        let symbol =
            Symbol::new(self.symbol.clone()).map_err(|e| ConnectorError::Parse(e.to_string()))?;
        Ok(MarkPriceTick {
            symbol,
            mark_price: self.mark_price,
            event_time: self.event_time,
        })
    }
}

// =============================================================================
// Stream client
// =============================================================================

/// Binance futures WebSocket client.
///
/// One client per stream: the user-data stream (orders + positions) or a
/// per-symbol mark-price stream. Parsed messages are forwarded into the
/// engine's channel; the receiving task owns all store mutation.
pub struct BinanceStreamClient {
    /// WebSocket stream (with TLS wrapper)
    ws_stream: WsStream,
    /// Destination for parsed messages
    sender: mpsc::UnboundedSender<StreamMessage>,
    /// Whether the client is connected
    connected: bool,
}

impl BinanceStreamClient {
    /// Default WebSocket base URL for mainnet or testnet.
    pub fn default_ws_base(testnet: bool) -> &'static str {
        if testnet {
            FUTURES_TESTNET_WS_URL
        } else {
            FUTURES_WS_URL
        }
    }

    /// Connect to the user-data stream for a listen key.
    pub async fn connect_user(
        ws_base: &str,
        listen_key: &str,
        sender: mpsc::UnboundedSender<StreamMessage>,
    ) -> Result<Self, ConnectorError> {
        let url = format!("{}/{}", ws_base.trim_end_matches('/'), listen_key);
        Self::connect(&url, sender).await
    }

    /// Connect to the mark-price stream for a symbol.
    pub async fn connect_mark_price(
        ws_base: &str,
        symbol: &Symbol,
        sender: mpsc::UnboundedSender<StreamMessage>,
    ) -> Result<Self, ConnectorError> {
        let stream_name = format!("{}@markPrice", symbol.as_str().to_lowercase());
        let url = format!("{}/{}", ws_base.trim_end_matches('/'), stream_name);
        Self::connect(&url, sender).await
    }

    async fn connect(
        url: &str,
        sender: mpsc::UnboundedSender<StreamMessage>,
    ) -> Result<Self, ConnectorError> {
        info!(%url, "Connecting to Binance WebSocket");

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| ConnectorError::Connection(e.to_string()))?;

        info!(%url, "Connected to Binance WebSocket");

        Ok(Self {
            ws_stream,
            sender,
            connected: true,
        })
    }

    /// Run the client message loop.
    ///
    /// Processes incoming frames and forwards parsed messages until the
    /// connection closes or an error occurs.
    pub async fn run(&mut self) -> Result<(), ConnectorError> {
        while self.connected {
            match timeout(Duration::from_secs(READ_TIMEOUT_SECS), self.next_message()).await {
                Ok(Ok(Some(msg))) => {
                    if let Err(e) = self.handle_message(msg) {
                        error!(error = %e, "Error handling message");
                        // Continue processing other messages
                    }
                }
                Ok(Ok(None)) => {
                    warn!("WebSocket stream closed");
                    self.connected = false;
                    return Err(ConnectorError::Connection("stream closed".to_string()));
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Error reading from WebSocket");
                    self.connected = false;
                    return Err(e);
                }
                Err(_) => {
                    error!("Timeout waiting for message");
                    self.connected = false;
                    return Err(ConnectorError::Timeout);
                }
            }
        }

        Ok(())
    }

    /// Read the next message from the WebSocket stream.
    async fn next_message(&mut self) -> Result<Option<WebSocketMessage>, ConnectorError> {
        match self.ws_stream.next().await {
            Some(Ok(msg)) => Ok(Some(msg)),
            Some(Err(e)) => {
                error!(error = %e, "WebSocket error");
                Err(ConnectorError::Connection(format!("{:?}", e)))
            }
            None => {
                warn!("WebSocket stream ended");
                self.connected = false;
                Ok(None)
            }
        }
    }

    /// Handle a single WebSocket frame.
    fn handle_message(&mut self, msg: WebSocketMessage) -> Result<(), ConnectorError> {
        match msg {
            WebSocketMessage::Text(text) => {
                let parsed = parse_stream_message(&text)?;
                if matches!(parsed, StreamMessage::Ignored) {
                    debug!("Ignoring unrecognized stream message kind");
                }
                // Receiver gone means the engine is shutting down
                if self.sender.send(parsed).is_err() {
                    self.connected = false;
                }
            }
            WebSocketMessage::Ping(_) => {
                // tungstenite answers pings automatically
                debug!("Received ping from Binance");
            }
            WebSocketMessage::Pong(_) => {
                debug!("Received pong from Binance");
            }
            WebSocketMessage::Close(_) => {
                self.connected = false;
                warn!("WebSocket connection closed");
                return Err(ConnectorError::Connection("close frame received".to_string()));
            }
            _ => {
                // Ignore other frame types
            }
        }

        Ok(())
    }

    /// Check if the client is still connected.
    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

// =============================================================================
// Tests
// =============================================================================
