//! Order book module
//!
//! Value types for two-sided price ladder snapshots of binary market
//! outcome tokens. Snapshots are replaced wholesale on every book event;
//! nothing here patches incrementally.

mod book;

pub use book::OrderbookSnapshot;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price level in the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderbookLevel {
    /// Price in (0, 1]
    pub price: Decimal,
    /// Total size available
    pub size: Decimal,
}
