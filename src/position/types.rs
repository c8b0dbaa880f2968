//! Position types

use crate::market::Outcome;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a position should exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
}

/// An open trading position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Position identifier
    pub id: Uuid,
    /// Outcome side held
    pub side: Outcome,
    /// Token the position is in
    pub token_id: String,
    /// Entry price
    pub entry_price: Decimal,
    /// Position size
    pub size: Decimal,
    /// Entry timestamp
    pub entry_time: DateTime<Utc>,
    /// Order reference from the execution layer, if any
    pub order_id: Option<String>,
    /// Take-profit delta above entry, fixed at open time
    pub take_profit_delta: Decimal,
    /// Stop-loss delta below entry, fixed at open time
    pub stop_loss_delta: Decimal,
}

impl Position {
    /// Target price for take profit
    pub fn take_profit_price(&self) -> Decimal {
        self.entry_price + self.take_profit_delta
    }

    /// Target price for stop loss
    pub fn stop_loss_price(&self) -> Decimal {
        self.entry_price - self.stop_loss_delta
    }

    /// Unrealized PnL at the given price
    pub fn pnl(&self, current_price: Decimal) -> Decimal {
        (current_price - self.entry_price) * self.size
    }

    /// Unrealized PnL as a percentage of entry
    pub fn pnl_percent(&self, current_price: Decimal) -> Decimal {
        if self.entry_price > Decimal::ZERO {
            (current_price - self.entry_price) / self.entry_price * dec!(100)
        } else {
            Decimal::ZERO
        }
    }

    /// Time held so far
    pub fn hold_time(&self) -> Duration {
        Utc::now() - self.entry_time
    }

    /// Whether the take-profit target is hit (inclusive)
    pub fn hits_take_profit(&self, current_price: Decimal) -> bool {
        current_price >= self.take_profit_price()
    }

    /// Whether the stop-loss target is hit (inclusive)
    pub fn hits_stop_loss(&self, current_price: Decimal) -> bool {
        current_price <= self.stop_loss_price()
    }
}
