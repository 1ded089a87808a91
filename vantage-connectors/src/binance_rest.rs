//! Binance USDⓈ-M Futures REST API Client
//!
//! Provides the pull side of the engine:
//! - Exchange metadata (symbol filter records) for the precision registry
//! - Open-order and position snapshots
//! - Close-position market orders
//! - Authentication via HMAC SHA256 signatures
//!
//! # Authentication
//!
//! Binance uses API key + secret with HMAC SHA256 signatures.
//! All signed requests require:
//! - `X-MBX-APIKEY` header
//! - `signature` query parameter (HMAC SHA256 of query string)
//! - `timestamp` query parameter

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;

use vantage_domain::{Order, OrderSide, OrderStatus, OrderType, Position, Side, StatusFilter, Symbol};
use vantage_precision::ExchangeMetadata;

use crate::error::ConnectorError;
use crate::ports::{CloseOutcome, OrderQuery, SnapshotSource, TradeActions};

// =============================================================================
// Constants
// =============================================================================

/// Binance futures REST API base URL
const FUTURES_API_URL: &str = "https://fapi.binance.com";

/// Binance futures testnet REST API base URL
const FUTURES_TESTNET_URL: &str = "https://testnet.binancefuture.com";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Binance REST Client
// =============================================================================

/// Binance futures REST API client.
pub struct BinanceRestClient {
    /// HTTP client
    client: Client,
    /// API key
    api_key: String,
    /// API secret
    api_secret: String,
    /// Use testnet (for testing)
    testnet: bool,
}

impl BinanceRestClient {
    /// Create a new Binance REST client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Binance API key
    /// * `api_secret` - Binance API secret
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_secret,
            testnet: false,
        }
    }

    /// Create a client for the futures testnet.
    pub fn testnet(api_key: String, api_secret: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_secret,
            testnet: true,
        }
    }

    /// Get the base URL for API requests.
    fn base_url(&self) -> &str {
        if self.testnet {
            FUTURES_TESTNET_URL
        } else {
            FUTURES_API_URL
        }
    }

    /// Build query string with signature for signed requests.
    ///
    /// Binance requires:
    /// 1. All parameters in query string
    /// 2. HMAC SHA256 signature of query string
    /// 3. signature and timestamp as query parameters
    fn build_signed_query(
        &self,
        mut params: Vec<(&str, String)>,
    ) -> Result<String, ConnectorError> {
        // Add timestamp
        let timestamp = Utc::now().timestamp_millis().to_string();
        params.push(("timestamp", timestamp));

        // Sort parameters (required by Binance)
        params.sort_by(|a, b| a.0.cmp(b.0));

        // Build query string
        let query_string: String = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        // Create signature
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        type HmacSha256 = Hmac<Sha256>;

        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| ConnectorError::Signature(format!("HMAC error: {}", e)))?;

        mac.update(query_string.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        // Add signature to query string
        Ok(format!("{}&signature={}", query_string, signature))
    }

    /// Send a GET request to a public endpoint.
    async fn get_public(
        &self,
        endpoint: &str,
        params: Vec<(&str, String)>,
    ) -> Result<String, ConnectorError> {
        let url = if params.is_empty() {
            format!("{}{}", self.base_url(), endpoint)
        } else {
            let query = params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            format!("{}{}?{}", self.base_url(), endpoint, query)
        };

        let response = timeout(
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
            self.client.get(&url).send(),
        )
        .await
        .map_err(|_| ConnectorError::Timeout)?
        .map_err(|e| ConnectorError::RequestFailed(e.to_string()))?;

        Self::read_body(response).await
    }

    /// Send a GET request to a signed endpoint.
    async fn get_signed(
        &self,
        endpoint: &str,
        params: Vec<(&str, String)>,
    ) -> Result<String, ConnectorError> {
        let query = self.build_signed_query(params)?;
        let url = format!("{}{}?{}", self.base_url(), endpoint, query);

        let response = timeout(
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
            self.client
                .get(&url)
                .header("X-MBX-APIKEY", &self.api_key)
                .send(),
        )
        .await
        .map_err(|_| ConnectorError::Timeout)?
        .map_err(|e| ConnectorError::RequestFailed(e.to_string()))?;

        Self::read_body(response).await
    }

    /// Send a POST request to a signed endpoint.
    async fn post_signed(
        &self,
        endpoint: &str,
        params: Vec<(&str, String)>,
    ) -> Result<String, ConnectorError> {
        let query = self.build_signed_query(params)?;
        let url = format!("{}{}?{}", self.base_url(), endpoint, query);

        let response = timeout(
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
            self.client
                .post(&url)
                .header("X-MBX-APIKEY", &self.api_key)
                .send(),
        )
        .await
        .map_err(|_| ConnectorError::Timeout)?
        .map_err(|e| ConnectorError::RequestFailed(e.to_string()))?;

        Self::read_body(response).await
    }

    /// Send a POST request authenticated by API key only (no signature).
    async fn post_keyed(&self, endpoint: &str) -> Result<String, ConnectorError> {
        let url = format!("{}{}", self.base_url(), endpoint);

        let response = timeout(
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
            self.client
                .post(&url)
                .header("X-MBX-APIKEY", &self.api_key)
                .send(),
        )
        .await
        .map_err(|_| ConnectorError::Timeout)?
        .map_err(|e| ConnectorError::RequestFailed(e.to_string()))?;

        Self::read_body(response).await
    }

    /// Read a response body, mapping exchange error payloads.
    async fn read_body(response: reqwest::Response) -> Result<String, ConnectorError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ConnectorError::Parse(e.to_string()))?;

        if !status.is_success() {
            // Try to parse Binance error response
            if let Ok(err) = serde_json::from_str::<BinanceErrorResponse>(&body) {
                return Err(ConnectorError::Api { code: err.code, msg: err.msg });
            }
            return Err(ConnectorError::RequestFailed(format!("HTTP {}: {}", status, body)));
        }

        Ok(body)
    }

    // =========================================================================
    // User data stream keys
    // =========================================================================

    /// Create a user-data-stream listen key.
    ///
    /// # Endpoint
    ///
    /// `POST /fapi/v1/listenKey`
    pub async fn create_listen_key(&self) -> Result<String, ConnectorError> {
        let body = self.post_keyed("/fapi/v1/listenKey").await?;
        let response: ListenKeyResponse =
            serde_json::from_str(&body).map_err(|e| ConnectorError::Parse(e.to_string()))?;
        Ok(response.listen_key)
    }

    /// Keep the user-data-stream listen key alive.
    ///
    /// Binance expires listen keys after 60 minutes without a keepalive.
    ///
    /// # Endpoint
    ///
    /// `PUT /fapi/v1/listenKey`
    pub async fn keepalive_listen_key(&self) -> Result<(), ConnectorError> {
        let url = format!("{}/fapi/v1/listenKey", self.base_url());

        let response = timeout(
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
            self.client
                .put(&url)
                .header("X-MBX-APIKEY", &self.api_key)
                .send(),
        )
        .await
        .map_err(|_| ConnectorError::Timeout)?
        .map_err(|e| ConnectorError::RequestFailed(e.to_string()))?;

        Self::read_body(response).await?;
        Ok(())
    }
}

// =============================================================================
// Snapshot source implementation
// =============================================================================

#[async_trait]
impl SnapshotSource for BinanceRestClient {
    /// Fetch exchange metadata.
    ///
    /// # Endpoint
    ///
    /// `GET /fapi/v1/exchangeInfo` (public)
    async fn fetch_exchange_metadata(&self) -> Result<ExchangeMetadata, ConnectorError> {
        let body = self.get_public("/fapi/v1/exchangeInfo", vec![]).await?;
        serde_json::from_str(&body).map_err(|e| ConnectorError::Parse(e.to_string()))
    }

    /// Fetch orders matching the query.
    ///
    /// # Endpoints
    ///
    /// - Open scope: `GET /fapi/v1/openOrders` (symbol optional)
    /// - Any other scope: `GET /fapi/v1/allOrders` (symbol required),
    ///   filtered client-side to the query's status criterion
    async fn fetch_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, ConnectorError> {
        let mut params = Vec::new();
        if let Some(symbol) = &query.symbol {
            params.push(("symbol", symbol.as_str().to_string()));
        }

        let endpoint = match query.status {
            StatusFilter::Open => "/fapi/v1/openOrders",
            _ => {
                if query.symbol.is_none() {
                    return Err(ConnectorError::InvalidParameter(
                        "historical order snapshots require a symbol".to_string(),
                    ));
                }
                if let Some(limit) = query.limit {
                    params.push(("limit", limit.to_string()));
                }
                "/fapi/v1/allOrders"
            }
        };

        let body = self.get_signed(endpoint, params).await?;
        let rows: Vec<FuturesOrderRow> =
            serde_json::from_str(&body).map_err(|e| ConnectorError::Parse(e.to_string()))?;

        let orders: Vec<Order> = rows
            .into_iter()
            .map(FuturesOrderRow::into_order)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|order| query.covers(order))
            .collect();

        debug!(count = orders.len(), "order snapshot fetched");
        Ok(orders)
    }

    /// Fetch all open positions.
    ///
    /// Rows with zero quantity (flat hedge-mode slots) are dropped.
    ///
    /// # Endpoint
    ///
    /// `GET /fapi/v2/positionRisk`
    async fn fetch_positions(&self) -> Result<Vec<Position>, ConnectorError> {
        let body = self.get_signed("/fapi/v2/positionRisk", vec![]).await?;
        let rows: Vec<PositionRiskRow> =
            serde_json::from_str(&body).map_err(|e| ConnectorError::Parse(e.to_string()))?;

        let positions: Vec<Position> = rows
            .into_iter()
            .filter(|row| !row.position_amt.is_zero())
            .map(PositionRiskRow::into_position)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = positions.len(), "position snapshot fetched");
        Ok(positions)
    }
}

// =============================================================================
// Trade actions implementation
// =============================================================================

#[async_trait]
impl TradeActions for BinanceRestClient {
    /// Close a position with a reduce-only market order.
    ///
    /// In hedge mode the closing order names the position side and the
    /// opposite order side; reduce-only is implied by `positionSide`.
    ///
    /// # Endpoint
    ///
    /// `POST /fapi/v1/order`
    async fn close_position(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: Decimal,
    ) -> Result<CloseOutcome, ConnectorError> {
        if quantity <= Decimal::ZERO {
            return Err(ConnectorError::InvalidParameter(format!(
                "close quantity must be positive, got {}",
                quantity
            )));
        }

        let client_order_id = Uuid::now_v7().to_string();
        let params = vec![
            ("symbol", symbol.as_str().to_string()),
            ("side", side.closing_order_side().to_string()),
            ("positionSide", side.to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", quantity.to_string()),
            ("newClientOrderId", client_order_id.clone()),
        ];

        let body = self.post_signed("/fapi/v1/order", params).await?;
        let ack: OrderAck =
            serde_json::from_str(&body).map_err(|e| ConnectorError::Parse(e.to_string()))?;

        Ok(CloseOutcome {
            order_id: ack.order_id,
            client_order_id: ack.client_order_id,
            symbol: symbol.clone(),
            side,
            accepted_at: Utc::now(),
        })
    }
}

// =============================================================================
// Binance Types (from API responses)
// =============================================================================

/// Binance error response.
#[derive(Debug, Deserialize)]
struct BinanceErrorResponse {
    code: i64,
    msg: String,
}

/// Listen key response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListenKeyResponse {
    listen_key: String,
}

/// An order row from `openOrders` / `allOrders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FuturesOrderRow {
    order_id: i64,
    symbol: String,
    side: OrderSide,
    #[serde(rename = "type")]
    order_type: OrderType,
    status: OrderStatus,
    orig_qty: Decimal,
    executed_qty: Decimal,
    #[serde(default)]
    avg_price: Decimal,
    price: Decimal,
    #[serde(default)]
    reduce_only: bool,
    #[serde(default)]
    close_position: bool,
    update_time: i64,
}

impl FuturesOrderRow {
    fn into_order(self) -> Result<Order, ConnectorError> {
        let symbol = Symbol::new(self.symbol).map_err(|e| ConnectorError::Parse(e.to_string()))?;
        Ok(Order {
            order_id: self.order_id,
            symbol,
            side: self.side,
            order_type: self.order_type,
            status: self.status,
            orig_qty: self.orig_qty,
            executed_qty: self.executed_qty,
            avg_price: self.avg_price,
            price: self.price,
            reduce_only: self.reduce_only,
            close_position: self.close_position,
            // Realized profit arrives on the stream, not on order snapshots
            realized_profit: Decimal::ZERO,
            update_time: self.update_time,
        })
    }
}

/// A position row from `positionRisk`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRiskRow {
    symbol: String,
    position_amt: Decimal,
    entry_price: Decimal,
    #[serde(default)]
    isolated_margin: Decimal,
    leverage: Decimal,
    position_side: String,
}

impl PositionRiskRow {
    fn into_position(self) -> Result<Position, ConnectorError> {
        let symbol = Symbol::new(self.symbol).map_err(|e| ConnectorError::Parse(e.to_string()))?;

        // One-way accounts report "BOTH"; the sign of the amount carries
        // the direction in that case.
        let side = match self.position_side.as_str() {
            "LONG" => Side::Long,
            "SHORT" => Side::Short,
            _ if self.position_amt < Decimal::ZERO => Side::Short,
            _ => Side::Long,
        };

        Ok(Position {
            symbol,
            side,
            quantity: self.position_amt.abs(),
            entry_price: self.entry_price,
            margin: self.isolated_margin,
            leverage: self.leverage.to_u32().unwrap_or(1),
            stop_loss: None,
            take_profit: None,
            // Derived fields are owned by valuation, never by a snapshot
            mark_price: Decimal::ZERO,
            pnl: Decimal::ZERO,
            pnl_percent: Decimal::ZERO,
        })
    }
}

/// Order placement acknowledgement.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderAck {
    order_id: i64,
    client_order_id: String,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_build_signed_query() {
        let client = BinanceRestClient::new("test_key".to_string(), "test_secret".to_string());

        let params = vec![("symbol", "BTCUSDT".to_string())];
        let query = client.build_signed_query(params).unwrap();

        // Query should contain timestamp and signature
        assert!(query.contains("timestamp="));
        assert!(query.contains("signature="));
        assert!(query.contains("symbol=BTCUSDT"));
    }

    #[test]
    fn test_build_signed_query_sorts_params() {
        let client = BinanceRestClient::new("test_key".to_string(), "test_secret".to_string());

        // Add params in reverse alphabetical order
        let params = vec![
            ("symbol", "BTCUSDT".to_string()),
            ("side", "SELL".to_string()),
        ];
        let query = client.build_signed_query(params).unwrap();

        // Params should be sorted (side comes before symbol)
        let side_idx = query.find("side=").unwrap();
        let symbol_idx = query.find("symbol=").unwrap();
        assert!(side_idx < symbol_idx);
    }

    #[test]
    fn test_order_row_maps_to_domain() {
        let json = r#"
        {
            "orderId": 283194212,
            "symbol": "BTCUSDT",
            "status": "PARTIALLY_FILLED",
            "clientOrderId": "x-abc",
            "price": "95000.10",
            "avgPrice": "94999.90",
            "origQty": "0.400",
            "executedQty": "0.100",
            "cumQuote": "9499.99",
            "type": "LIMIT",
            "reduceOnly": false,
            "closePosition": false,
            "side": "BUY",
            "positionSide": "LONG",
            "updateTime": 1700000000123
        }
        "#;

        let row: FuturesOrderRow = serde_json::from_str(json).unwrap();
        let order = row.into_order().unwrap();

        assert_eq!(order.order_id, 283194212);
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.orig_qty, dec!(0.400));
        assert_eq!(order.executed_qty, dec!(0.100));
        assert_eq!(order.avg_price, dec!(94999.90));
        assert_eq!(order.update_time, 1_700_000_000_123);
        assert_eq!(order.realized_profit, Decimal::ZERO);
    }

    #[test]
    fn test_position_row_maps_hedge_side() {
        let json = r#"
        {
            "symbol": "ETHUSDT",
            "positionAmt": "-2.500",
            "entryPrice": "3000.00",
            "markPrice": "2990.12345678",
            "unRealizedProfit": "24.69135802",
            "liquidationPrice": "3400.00",
            "leverage": "20",
            "marginType": "isolated",
            "isolatedMargin": "375.00000000",
            "positionSide": "SHORT"
        }
        "#;

        let row: PositionRiskRow = serde_json::from_str(json).unwrap();
        let position = row.into_position().unwrap();

        assert_eq!(position.side, Side::Short);
        assert_eq!(position.quantity, dec!(2.5));
        assert_eq!(position.entry_price, dec!(3000));
        assert_eq!(position.margin, dec!(375));
        assert_eq!(position.leverage, 20);
        // Derived fields start at zero regardless of what the row carried
        assert_eq!(position.mark_price, Decimal::ZERO);
        assert_eq!(position.pnl, Decimal::ZERO);
    }

    #[test]
    fn test_position_row_one_way_mode_uses_sign() {
        let json = r#"
        {
            "symbol": "BTCUSDT",
            "positionAmt": "-0.010",
            "entryPrice": "95000.00",
            "leverage": "10",
            "isolatedMargin": "95.00",
            "positionSide": "BOTH"
        }
        "#;

        let row: PositionRiskRow = serde_json::from_str(json).unwrap();
        let position = row.into_position().unwrap();

        assert_eq!(position.side, Side::Short);
        assert_eq!(position.quantity, dec!(0.01));
    }

    #[tokio::test]
    async fn test_historical_query_without_symbol_is_rejected() {
        let client = BinanceRestClient::new("key".to_string(), "secret".to_string());
        let query = OrderQuery {
            status: StatusFilter::All,
            symbol: None,
            limit: Some(10),
        };

        let result = client.fetch_orders(&query).await;
        assert!(matches!(result, Err(ConnectorError::InvalidParameter(_))));
    }
}
