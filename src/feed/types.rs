//! Feed types, configuration, and wire event schema

use crate::orderbook::OrderbookSnapshot;
use chrono::{DateTime, TimeZone, Utc};
use futures_util::future::BoxFuture;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Feed client configuration
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket URL to connect to
    pub url: String,
    /// Fixed delay between reconnection attempts
    pub reconnect_interval: Duration,
    /// Interval for sending ping frames
    pub ping_interval: Duration,
    /// Timeout for pong response
    pub ping_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: super::WSS_MARKET_URL.to_string(),
            reconnect_interval: Duration::from_secs(5),
            ping_interval: Duration::from_secs(20),
            ping_timeout: Duration::from_secs(10),
        }
    }
}

impl FeedConfig {
    /// Create a new config with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the fixed reconnection delay
    pub fn reconnect_interval(mut self, d: Duration) -> Self {
        self.reconnect_interval = d;
        self
    }

    /// Set ping interval
    pub fn ping_interval(mut self, d: Duration) -> Self {
        self.ping_interval = d;
        self
    }

    /// Set pong timeout
    pub fn ping_timeout(mut self, d: Duration) -> Self {
        self.ping_timeout = d;
        self
    }

    /// Receive timeout for the read loop: one ping interval plus slack
    pub fn recv_timeout(&self) -> Duration {
        self.ping_interval + Duration::from_secs(5)
    }
}

/// Feed errors
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    /// Connection could not be established
    #[error("connection failed: {0}")]
    ConnectFailed(String),
    /// Connection dropped mid-stream
    #[error("connection closed: {0}")]
    Closed(String),
    /// Outbound frame could not be sent
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Subscription frame sent on (re)connect or full replacement
#[derive(Debug, Serialize)]
pub struct MarketSubscription {
    pub assets_ids: Vec<String>,
    #[serde(rename = "type")]
    pub channel: String,
}

impl MarketSubscription {
    pub fn new(assets_ids: Vec<String>) -> Self {
        Self {
            assets_ids,
            channel: "MARKET".to_string(),
        }
    }
}

/// Incremental subscribe/unsubscribe frame
#[derive(Debug, Serialize)]
pub struct SubscriptionOp {
    pub assets_ids: Vec<String>,
    pub operation: String,
}

impl SubscriptionOp {
    pub fn subscribe(assets_ids: Vec<String>) -> Self {
        Self {
            assets_ids,
            operation: "subscribe".to_string(),
        }
    }

    pub fn unsubscribe(assets_ids: Vec<String>) -> Self {
        Self {
            assets_ids,
            operation: "unsubscribe".to_string(),
        }
    }
}

/// Wire `book` event: full order book replacement for one token
#[derive(Debug, Clone, Deserialize)]
pub struct BookEvent {
    pub asset_id: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    #[serde(default)]
    pub asks: Vec<BookLevel>,
    #[serde(default)]
    pub hash: String,
}

/// Price level as it appears on the wire (string-encoded numbers)
#[derive(Debug, Clone, Deserialize)]
pub struct BookLevel {
    pub price: String,
    pub size: String,
}

/// Wire `price_change` event: batch of ticks for one market
#[derive(Debug, Deserialize)]
pub struct PriceChangeEvent {
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub price_changes: Vec<RawPriceChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPriceChange {
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub best_bid: String,
    #[serde(default)]
    pub best_ask: String,
    #[serde(default)]
    pub hash: String,
}

/// Parsed price tick forwarded to the price-change callback
#[derive(Debug, Clone)]
pub struct PriceChange {
    pub asset_id: String,
    pub price: Decimal,
    pub size: Decimal,
    pub side: String,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
    pub hash: String,
}

impl PriceChange {
    /// Parse a raw tick, defaulting absent fields to a neutral book
    pub fn from_raw(raw: &RawPriceChange) -> Self {
        Self {
            asset_id: raw.asset_id.clone(),
            price: Decimal::from_str(&raw.price).unwrap_or(Decimal::ZERO),
            size: Decimal::from_str(&raw.size).unwrap_or(Decimal::ZERO),
            side: raw.side.clone(),
            best_bid: Decimal::from_str(&raw.best_bid).unwrap_or(Decimal::ZERO),
            best_ask: Decimal::from_str(&raw.best_ask).unwrap_or(Decimal::ONE),
            hash: raw.hash.clone(),
        }
    }
}

/// Wire `last_trade_price` event
#[derive(Debug, Deserialize)]
pub struct RawLastTrade {
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub fee_rate_bps: String,
}

/// Parsed trade forwarded to the trade callback
#[derive(Debug, Clone)]
pub struct LastTrade {
    pub asset_id: String,
    pub market: String,
    pub price: Decimal,
    pub size: Decimal,
    pub side: String,
    pub timestamp: DateTime<Utc>,
    pub fee_rate_bps: i64,
}

impl LastTrade {
    pub fn from_raw(raw: &RawLastTrade) -> Self {
        let timestamp = raw
            .timestamp
            .parse::<i64>()
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);

        Self {
            asset_id: raw.asset_id.clone(),
            market: raw.market.clone(),
            price: Decimal::from_str(&raw.price).unwrap_or(Decimal::ZERO),
            size: Decimal::from_str(&raw.size).unwrap_or(Decimal::ZERO),
            side: raw.side.clone(),
            timestamp,
            fee_rate_bps: raw.fee_rate_bps.parse().unwrap_or(0),
        }
    }
}

/// Book update listener. May suspend; awaited to completion per event.
pub type BookCallback =
    Arc<dyn Fn(OrderbookSnapshot) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Price change listener: (market, changes)
pub type PriceChangeCallback =
    Arc<dyn Fn(String, Vec<PriceChange>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Trade listener
pub type TradeCallback =
    Arc<dyn Fn(LastTrade) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Connect/disconnect listener
pub type ConnectionCallback = Arc<dyn Fn() + Send + Sync>;

/// Error listener
pub type ErrorCallback = Arc<dyn Fn(&FeedError) + Send + Sync>;
