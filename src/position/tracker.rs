//! Position tracker with TP/SL exit checks and trade statistics

use super::types::{ExitReason, Position};
use crate::market::Outcome;
use crate::telemetry::{increment_counter, set_gauge, CounterMetric, GaugeMetric};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Position management configuration
#[derive(Debug, Clone)]
pub struct PositionConfig {
    /// Take-profit delta above entry
    pub take_profit: Decimal,
    /// Stop-loss delta below entry
    pub stop_loss: Decimal,
    /// Maximum concurrent open positions
    pub max_positions: usize,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            take_profit: dec!(0.10),
            stop_loss: dec!(0.05),
            max_positions: 1,
        }
    }
}

/// Aggregate trade statistics
#[derive(Debug, Clone, Serialize)]
pub struct TrackerStats {
    pub trades_opened: u64,
    pub trades_closed: u64,
    pub open_positions: usize,
    pub total_pnl: Decimal,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub win_rate: Decimal,
}

/// Tracks open positions against TP/SL targets.
///
/// At most one open position per side; duplicate opens and opens beyond
/// `max_positions` are routine rejections returned as `None`, never
/// errors.
pub struct PositionTracker {
    config: PositionConfig,
    positions: HashMap<Uuid, Position>,
    by_side: HashMap<Outcome, Uuid>,
    trades_opened: u64,
    trades_closed: u64,
    realized_pnl: Decimal,
    winning_trades: u64,
    losing_trades: u64,
}

impl PositionTracker {
    /// Create a tracker with the given configuration
    pub fn new(config: PositionConfig) -> Self {
        Self {
            config,
            positions: HashMap::new(),
            by_side: HashMap::new(),
            trades_opened: 0,
            trades_closed: 0,
            realized_pnl: Decimal::ZERO,
            winning_trades: 0,
            losing_trades: 0,
        }
    }

    /// Create a tracker with default configuration
    pub fn with_defaults() -> Self {
        Self::new(PositionConfig::default())
    }

    /// Number of open positions
    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Whether another position may be opened
    pub fn can_open_position(&self) -> bool {
        self.positions.len() < self.config.max_positions
    }

    /// Win rate percentage over closed trades
    pub fn win_rate(&self) -> Decimal {
        let total = self.winning_trades + self.losing_trades;
        if total > 0 {
            Decimal::from(self.winning_trades) / Decimal::from(total) * dec!(100)
        } else {
            Decimal::ZERO
        }
    }

    /// Open a new position.
    ///
    /// TP/SL deltas are copied from the configuration at open time, so
    /// later reconfiguration never moves the targets of open positions.
    /// Returns `None` at the position cap or when the side is taken.
    pub fn open_position(
        &mut self,
        side: Outcome,
        token_id: impl Into<String>,
        entry_price: Decimal,
        size: Decimal,
        order_id: Option<String>,
    ) -> Option<Position> {
        if !self.can_open_position() {
            tracing::debug!(%side, "position cap reached, not opening");
            return None;
        }

        if self.by_side.contains_key(&side) {
            tracing::debug!(%side, "position already open on side, not opening");
            return None;
        }

        let position = Position {
            id: Uuid::new_v4(),
            side,
            token_id: token_id.into(),
            entry_price,
            size,
            entry_time: Utc::now(),
            order_id,
            take_profit_delta: self.config.take_profit,
            stop_loss_delta: self.config.stop_loss,
        };

        tracing::info!(
            id = %position.id,
            %side,
            entry = %entry_price,
            %size,
            tp = %position.take_profit_price(),
            sl = %position.stop_loss_price(),
            "opened position"
        );

        self.by_side.insert(side, position.id);
        self.positions.insert(position.id, position.clone());
        self.trades_opened += 1;
        increment_counter(CounterMetric::PositionsOpened);
        set_gauge(GaugeMetric::OpenPositions, self.positions.len() as f64);

        Some(position)
    }

    /// Close a position and fold its realized PnL into the statistics.
    ///
    /// A breakeven close counts as a win; a trade must realize strictly
    /// negative PnL to count as a loss.
    pub fn close_position(&mut self, position_id: Uuid, realized_pnl: Decimal) -> Option<Position> {
        let position = self.positions.remove(&position_id)?;

        if self.by_side.get(&position.side) == Some(&position_id) {
            self.by_side.remove(&position.side);
        }

        self.trades_closed += 1;
        self.realized_pnl += realized_pnl;

        if realized_pnl >= Decimal::ZERO {
            self.winning_trades += 1;
        } else {
            self.losing_trades += 1;
        }

        increment_counter(CounterMetric::PositionsClosed);
        set_gauge(GaugeMetric::OpenPositions, self.positions.len() as f64);
        set_gauge(
            GaugeMetric::RealizedPnl,
            self.realized_pnl.to_f64().unwrap_or(0.0),
        );

        tracing::info!(
            id = %position.id,
            side = %position.side,
            pnl = %realized_pnl,
            total_pnl = %self.realized_pnl,
            "closed position"
        );

        Some(position)
    }

    /// Get a position by id
    pub fn get_position(&self, position_id: Uuid) -> Option<&Position> {
        self.positions.get(&position_id)
    }

    /// Get the open position on a side
    pub fn get_position_by_side(&self, side: Outcome) -> Option<&Position> {
        self.by_side
            .get(&side)
            .and_then(|id| self.positions.get(id))
    }

    /// All open positions
    pub fn all_positions(&self) -> Vec<Position> {
        self.positions.values().cloned().collect()
    }

    /// Whether a side has an open position
    pub fn has_position(&self, side: Outcome) -> bool {
        self.by_side.contains_key(&side)
    }

    /// Check exit conditions for one position at the given price.
    ///
    /// Take-profit is checked before stop-loss; both boundaries are
    /// inclusive. Returns the exit reason (if any) and the unrealized
    /// PnL at that price.
    pub fn check_exit(
        &self,
        position_id: Uuid,
        current_price: Decimal,
    ) -> (Option<ExitReason>, Decimal) {
        let Some(position) = self.positions.get(&position_id) else {
            return (None, Decimal::ZERO);
        };

        let pnl = position.pnl(current_price);

        if position.hits_take_profit(current_price) {
            return (Some(ExitReason::TakeProfit), pnl);
        }

        if position.hits_stop_loss(current_price) {
            return (Some(ExitReason::StopLoss), pnl);
        }

        (None, pnl)
    }

    /// Check exit conditions for all open positions.
    ///
    /// Positions whose side has no usable price (absent or non-positive)
    /// are skipped.
    pub fn check_all_exits(
        &self,
        prices: &HashMap<Outcome, Decimal>,
    ) -> Vec<(Position, ExitReason, Decimal)> {
        let mut exits = Vec::new();

        for position in self.positions.values() {
            let price = prices.get(&position.side).copied().unwrap_or(Decimal::ZERO);
            if price <= Decimal::ZERO {
                continue;
            }

            let (reason, pnl) = self.check_exit(position.id, price);
            if let Some(reason) = reason {
                exits.push((position.clone(), reason, pnl));
            }
        }

        exits
    }

    /// Total unrealized PnL over all open positions
    pub fn unrealized_pnl(&self, prices: &HashMap<Outcome, Decimal>) -> Decimal {
        self.positions
            .values()
            .filter_map(|p| {
                let price = prices.get(&p.side).copied()?;
                (price > Decimal::ZERO).then(|| p.pnl(price))
            })
            .sum()
    }

    /// Total PnL: realized plus unrealized at the given prices
    pub fn total_pnl(&self, prices: &HashMap<Outcome, Decimal>) -> Decimal {
        self.realized_pnl + self.unrealized_pnl(prices)
    }

    /// Snapshot of trade statistics
    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            trades_opened: self.trades_opened,
            trades_closed: self.trades_closed,
            open_positions: self.positions.len(),
            total_pnl: self.realized_pnl,
            winning_trades: self.winning_trades,
            losing_trades: self.losing_trades,
            win_rate: self.win_rate(),
        }
    }

    /// Drop all open positions without touching statistics.
    ///
    /// For state resets only; closing through `close_position` is what
    /// books PnL.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.by_side.clear();
    }

    /// Reset all statistics
    pub fn reset_stats(&mut self) {
        self.trades_opened = 0;
        self.trades_closed = 0;
        self.realized_pnl = Decimal::ZERO;
        self.winning_trades = 0;
        self.losing_trades = 0;
    }
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self::with_defaults()
    }
}
