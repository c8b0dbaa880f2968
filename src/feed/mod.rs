//! Market data feed module
//!
//! Real-time order books, price changes, and trades from the Polymarket
//! CLOB WebSocket, with subscription management and fixed-interval
//! reconnect.

mod client;
mod types;

pub use client::MarketFeed;
pub use types::{
    BookCallback, BookEvent, BookLevel, ConnectionCallback, ErrorCallback, FeedConfig, FeedError,
    LastTrade, MarketSubscription, PriceChange, PriceChangeCallback, PriceChangeEvent,
    RawLastTrade, RawPriceChange, SubscriptionOp, TradeCallback,
};

/// Polymarket CLOB WebSocket URL for market data
pub const WSS_MARKET_URL: &str = "wss://ws-subscriptions-clob.polymarket.com/ws/market";
