//! Order book snapshot state

use super::OrderbookLevel;
use crate::feed::BookEvent;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Full order book snapshot for one outcome token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderbookSnapshot {
    /// Token identifier
    pub asset_id: String,
    /// Owning market (condition id)
    pub market: String,
    /// Server timestamp of the snapshot
    pub timestamp: DateTime<Utc>,
    /// Bid levels, sorted best (highest) to worst
    pub bids: Vec<OrderbookLevel>,
    /// Ask levels, sorted best (lowest) to worst
    pub asks: Vec<OrderbookLevel>,
    /// Opaque integrity hash from the feed
    pub hash: String,
}

impl OrderbookSnapshot {
    /// Create a new empty snapshot
    pub fn new(asset_id: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            market: String::new(),
            timestamp: Utc::now(),
            bids: vec![],
            asks: vec![],
            hash: String::new(),
        }
    }

    /// Build a snapshot from a wire `book` event.
    ///
    /// Levels with unparseable prices or sizes are dropped. Bids and asks
    /// are re-sorted here rather than trusted from the wire.
    pub fn from_event(event: &BookEvent) -> Self {
        let mut bids: Vec<OrderbookLevel> = event
            .bids
            .iter()
            .filter_map(|l| {
                Some(OrderbookLevel {
                    price: Decimal::from_str(&l.price).ok()?,
                    size: Decimal::from_str(&l.size).ok()?,
                })
            })
            .collect();
        let mut asks: Vec<OrderbookLevel> = event
            .asks
            .iter()
            .filter_map(|l| {
                Some(OrderbookLevel {
                    price: Decimal::from_str(&l.price).ok()?,
                    size: Decimal::from_str(&l.size).ok()?,
                })
            })
            .collect();

        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));

        // Wire timestamp is epoch milliseconds as a string
        let timestamp = event
            .timestamp
            .parse::<i64>()
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);

        Self {
            asset_id: event.asset_id.clone(),
            market: event.market.clone(),
            timestamp,
            bids,
            asks,
            hash: event.hash.clone(),
        }
    }

    /// Best bid price, 0 if the bid side is empty
    pub fn best_bid(&self) -> Decimal {
        self.bids.first().map(|l| l.price).unwrap_or(Decimal::ZERO)
    }

    /// Best ask price, 1 if the ask side is empty
    pub fn best_ask(&self) -> Decimal {
        self.asks.first().map(|l| l.price).unwrap_or(Decimal::ONE)
    }

    /// Mid price.
    ///
    /// Averages best bid and ask when both sides are present (bid > 0 and
    /// ask < 1), falls back to whichever side is present, and returns the
    /// 0.5 neutral prior for a fully empty book.
    pub fn mid_price(&self) -> Decimal {
        let bid = self.best_bid();
        let ask = self.best_ask();
        let has_bid = bid > Decimal::ZERO;
        let has_ask = ask < Decimal::ONE;

        if has_bid && has_ask {
            (bid + ask) / dec!(2)
        } else if has_bid {
            bid
        } else if has_ask {
            ask
        } else {
            dec!(0.5)
        }
    }

    /// Spread (best ask - best bid), 0 when there is no bid
    pub fn spread(&self) -> Decimal {
        let bid = self.best_bid();
        if bid > Decimal::ZERO {
            self.best_ask() - bid
        } else {
            Decimal::ZERO
        }
    }

    /// Best bid size
    pub fn best_bid_size(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.size)
    }

    /// Best ask size
    pub fn best_ask_size(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.size)
    }
}
