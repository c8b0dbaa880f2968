//! Price history and crash event types

use crate::market::Outcome;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// A price observation at a specific time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub side: Outcome,
}

/// Detected flash crash event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashCrashEvent {
    /// Which outcome crashed
    pub side: Outcome,
    /// Oldest in-window price
    pub old_price: Decimal,
    /// Most recent price
    pub new_price: Decimal,
    /// Absolute drop amount
    pub drop: Decimal,
    /// Detection time
    pub timestamp: DateTime<Utc>,
}

impl FlashCrashEvent {
    /// Percentage drop relative to the old price
    pub fn drop_percent(&self) -> Decimal {
        if self.old_price > Decimal::ZERO {
            (self.old_price - self.new_price) / self.old_price * dec!(100)
        } else {
            Decimal::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_percent() {
        let event = FlashCrashEvent {
            side: Outcome::Up,
            old_price: dec!(0.50),
            new_price: dec!(0.20),
            drop: dec!(0.30),
            timestamp: Utc::now(),
        };
        assert_eq!(event.drop_percent(), dec!(60));
    }

    #[test]
    fn test_drop_percent_zero_old_price() {
        let event = FlashCrashEvent {
            side: Outcome::Down,
            old_price: dec!(0),
            new_price: dec!(0),
            drop: dec!(0),
            timestamp: Utc::now(),
        };
        assert_eq!(event.drop_percent(), dec!(0));
    }
}
