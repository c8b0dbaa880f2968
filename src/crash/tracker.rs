//! Price history tracking and flash crash detection

use super::types::{FlashCrashEvent, PricePoint};
use crate::market::Outcome;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};

/// Configuration for flash crash detection
#[derive(Debug, Clone)]
pub struct CrashConfig {
    /// Detection window in seconds
    pub lookback_seconds: u64,
    /// Minimum absolute probability drop to qualify as a crash
    pub drop_threshold: Decimal,
    /// Retained observations per side
    pub max_history: usize,
}

impl Default for CrashConfig {
    fn default() -> Self {
        Self {
            lookback_seconds: 10,
            drop_threshold: dec!(0.30),
            max_history: 100,
        }
    }
}

/// Tracks per-side price history and detects flash crashes.
///
/// History is a ring buffer of `max_history` points per side; the oldest
/// point is evicted on overflow. Non-positive prices are sentinel values
/// from an empty book and are never recorded.
pub struct PriceTracker {
    config: CrashConfig,
    history: HashMap<Outcome, VecDeque<PricePoint>>,
}

impl PriceTracker {
    /// Create a tracker with the given configuration
    pub fn new(config: CrashConfig) -> Self {
        let mut history = HashMap::new();
        for side in Outcome::ALL {
            history.insert(side, VecDeque::with_capacity(config.max_history));
        }
        Self { config, history }
    }

    /// Create a tracker with default configuration
    pub fn with_defaults() -> Self {
        Self::new(CrashConfig::default())
    }

    /// Record a price observation at the current time
    pub fn record(&mut self, side: Outcome, price: Decimal) {
        self.record_at(side, price, Utc::now());
    }

    /// Record a price observation with an explicit timestamp
    pub fn record_at(&mut self, side: Outcome, price: Decimal, timestamp: DateTime<Utc>) {
        if price <= Decimal::ZERO {
            return;
        }

        let Some(history) = self.history.get_mut(&side) else {
            return;
        };
        if history.len() >= self.config.max_history {
            history.pop_front();
        }
        history.push_back(PricePoint {
            timestamp,
            price,
            side,
        });
    }

    /// Record prices for multiple sides at once
    pub fn record_prices(&mut self, prices: &HashMap<Outcome, Decimal>) {
        let now = Utc::now();
        for (side, price) in prices {
            self.record_at(*side, *price, now);
        }
    }

    /// Price history for a side, oldest first
    pub fn history(&self, side: Outcome) -> Vec<PricePoint> {
        self.history
            .get(&side)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of recorded observations for a side
    pub fn history_count(&self, side: Outcome) -> usize {
        self.history.get(&side).map(|h| h.len()).unwrap_or(0)
    }

    /// Most recent price for a side, 0 if none recorded
    pub fn current_price(&self, side: Outcome) -> Decimal {
        self.history
            .get(&side)
            .and_then(|h| h.back())
            .map(|p| p.price)
            .unwrap_or(Decimal::ZERO)
    }

    /// First (oldest-to-newest) observation at or after `seconds_ago`
    pub fn price_at(&self, side: Outcome, seconds_ago: i64) -> Option<Decimal> {
        let target = Utc::now() - Duration::seconds(seconds_ago);
        self.history
            .get(&side)?
            .iter()
            .find(|p| p.timestamp >= target)
            .map(|p| p.price)
    }

    /// Detect a flash crash on one side, or on both in Up-then-Down
    /// order, returning the first qualifying side's event.
    ///
    /// The reference price is the oldest observation still inside the
    /// lookback window; the drop is absolute (reference minus current).
    pub fn detect_flash_crash(&self, side: Option<Outcome>) -> Option<FlashCrashEvent> {
        let now = Utc::now();
        let sides: &[Outcome] = match side {
            Some(ref s) => std::slice::from_ref(s),
            None => &Outcome::ALL,
        };

        sides.iter().find_map(|s| self.detect_side(*s, now))
    }

    /// Detect flash crashes on all sides
    pub fn detect_all_crashes(&self) -> Vec<FlashCrashEvent> {
        let now = Utc::now();
        Outcome::ALL
            .iter()
            .filter_map(|s| self.detect_side(*s, now))
            .collect()
    }

    fn detect_side(&self, side: Outcome, now: DateTime<Utc>) -> Option<FlashCrashEvent> {
        let history = self.history.get(&side)?;
        if history.len() < 2 {
            return None;
        }

        let current = history.back()?.price;
        let lookback = Duration::seconds(self.config.lookback_seconds as i64);

        // Oldest point still inside the window; points that have aged
        // out never serve as reference.
        let reference = history
            .iter()
            .find(|p| now - p.timestamp <= lookback)?
            .price;

        let drop = reference - current;
        if drop < self.config.drop_threshold {
            return None;
        }

        Some(FlashCrashEvent {
            side,
            old_price: reference,
            new_price: current,
            drop,
            timestamp: now,
        })
    }

    /// Clear history for one side, or all sides.
    ///
    /// Used on market rollover so detection never spans two markets'
    /// price series.
    pub fn clear(&mut self, side: Option<Outcome>) {
        match side {
            Some(s) => {
                if let Some(h) = self.history.get_mut(&s) {
                    h.clear();
                }
            }
            None => {
                for h in self.history.values_mut() {
                    h.clear();
                }
            }
        }
    }

    /// Min/max price over the last `seconds`, (0, 0) if no data
    pub fn price_range(&self, side: Outcome, seconds: i64) -> (Decimal, Decimal) {
        let cutoff = Utc::now() - Duration::seconds(seconds);

        let prices: Vec<Decimal> = self
            .history
            .get(&side)
            .map(|h| {
                h.iter()
                    .filter(|p| p.timestamp >= cutoff)
                    .map(|p| p.price)
                    .collect()
            })
            .unwrap_or_default();

        match (prices.iter().min(), prices.iter().max()) {
            (Some(min), Some(max)) => (*min, *max),
            _ => (Decimal::ZERO, Decimal::ZERO),
        }
    }

    /// Price volatility (max minus min) over the last `seconds`
    pub fn volatility(&self, side: Outcome, seconds: i64) -> Decimal {
        let (min, max) = self.price_range(side, seconds);
        max - min
    }
}

impl Default for PriceTracker {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> PriceTracker {
        PriceTracker::new(CrashConfig {
            lookback_seconds: 10,
            drop_threshold: dec!(0.30),
            max_history: 100,
        })
    }

    fn seconds_ago(secs: i64) -> DateTime<Utc> {
        Utc::now() - Duration::seconds(secs)
    }

    #[test]
    fn test_record_and_current_price() {
        let mut t = tracker();
        assert_eq!(t.current_price(Outcome::Up), dec!(0));

        t.record(Outcome::Up, dec!(0.55));
        t.record(Outcome::Up, dec!(0.52));
        assert_eq!(t.history_count(Outcome::Up), 2);
        assert_eq!(t.current_price(Outcome::Up), dec!(0.52));
        assert_eq!(t.history_count(Outcome::Down), 0);
    }

    #[test]
    fn test_non_positive_prices_rejected() {
        let mut t = tracker();
        t.record(Outcome::Up, dec!(0));
        t.record(Outcome::Up, dec!(-0.1));
        assert_eq!(t.history_count(Outcome::Up), 0);
    }

    #[test]
    fn test_capacity_eviction_keeps_most_recent() {
        let mut t = PriceTracker::new(CrashConfig {
            max_history: 5,
            ..Default::default()
        });

        for i in 0..8 {
            t.record(Outcome::Up, Decimal::from(i + 1) / dec!(100));
        }

        assert_eq!(t.history_count(Outcome::Up), 5);
        let history = t.history(Outcome::Up);
        // Oldest three evicted; points 4..=8 remain
        assert_eq!(history.first().unwrap().price, dec!(0.04));
        assert_eq!(history.last().unwrap().price, dec!(0.08));
    }

    #[test]
    fn test_detect_flash_crash() {
        let mut t = tracker();
        t.record_at(Outcome::Up, dec!(0.55), seconds_ago(9));
        t.record_at(Outcome::Up, dec!(0.52), seconds_ago(5));
        t.record_at(Outcome::Up, dec!(0.20), seconds_ago(0));

        let event = t.detect_flash_crash(Some(Outcome::Up)).unwrap();
        assert_eq!(event.side, Outcome::Up);
        assert_eq!(event.old_price, dec!(0.55));
        assert_eq!(event.new_price, dec!(0.20));
        assert_eq!(event.drop, dec!(0.35));
    }

    #[test]
    fn test_no_crash_below_threshold() {
        let mut t = tracker();
        t.record_at(Outcome::Up, dec!(0.55), seconds_ago(9));
        t.record_at(Outcome::Up, dec!(0.30), seconds_ago(0));

        // Drop of 0.25 is under the 0.30 threshold
        assert!(t.detect_flash_crash(Some(Outcome::Up)).is_none());
    }

    #[test]
    fn test_aged_out_points_not_used_as_reference() {
        let mut t = tracker();
        t.record_at(Outcome::Up, dec!(0.90), seconds_ago(60));
        t.record_at(Outcome::Up, dec!(0.50), seconds_ago(3));
        t.record_at(Outcome::Up, dec!(0.45), seconds_ago(0));

        // The 0.90 point is outside the window; reference is 0.50 and
        // the 0.05 drop does not qualify.
        assert!(t.detect_flash_crash(Some(Outcome::Up)).is_none());
    }

    #[test]
    fn test_detect_requires_two_observations() {
        let mut t = tracker();
        t.record(Outcome::Up, dec!(0.55));
        assert!(t.detect_flash_crash(Some(Outcome::Up)).is_none());
    }

    #[test]
    fn test_detect_scans_up_before_down() {
        let mut t = tracker();
        t.record_at(Outcome::Up, dec!(0.60), seconds_ago(8));
        t.record_at(Outcome::Up, dec!(0.20), seconds_ago(0));
        t.record_at(Outcome::Down, dec!(0.70), seconds_ago(8));
        t.record_at(Outcome::Down, dec!(0.10), seconds_ago(0));

        let event = t.detect_flash_crash(None).unwrap();
        assert_eq!(event.side, Outcome::Up);

        let all = t.detect_all_crashes();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].side, Outcome::Up);
        assert_eq!(all[1].side, Outcome::Down);
    }

    #[test]
    fn test_price_at() {
        let mut t = tracker();
        t.record_at(Outcome::Up, dec!(0.55), seconds_ago(20));
        t.record_at(Outcome::Up, dec!(0.50), seconds_ago(8));
        t.record_at(Outcome::Up, dec!(0.45), seconds_ago(2));

        assert_eq!(t.price_at(Outcome::Up, 10), Some(dec!(0.50)));
        assert_eq!(t.price_at(Outcome::Up, 4), Some(dec!(0.45)));
        assert_eq!(t.price_at(Outcome::Down, 10), None);
    }

    #[test]
    fn test_price_range_and_volatility() {
        let mut t = tracker();
        assert_eq!(t.price_range(Outcome::Up, 30), (dec!(0), dec!(0)));
        assert_eq!(t.volatility(Outcome::Up, 30), dec!(0));

        t.record_at(Outcome::Up, dec!(0.80), seconds_ago(60));
        t.record_at(Outcome::Up, dec!(0.50), seconds_ago(10));
        t.record_at(Outcome::Up, dec!(0.42), seconds_ago(5));
        t.record_at(Outcome::Up, dec!(0.58), seconds_ago(1));

        // The 60s-old point is outside the 30s window
        assert_eq!(t.price_range(Outcome::Up, 30), (dec!(0.42), dec!(0.58)));
        assert_eq!(t.volatility(Outcome::Up, 30), dec!(0.16));
    }

    #[test]
    fn test_clear_one_side() {
        let mut t = tracker();
        t.record(Outcome::Up, dec!(0.55));
        t.record(Outcome::Down, dec!(0.45));

        t.clear(Some(Outcome::Up));
        assert_eq!(t.history_count(Outcome::Up), 0);
        assert_eq!(t.history_count(Outcome::Down), 1);
    }

    #[test]
    fn test_clear_all_sides() {
        let mut t = tracker();
        t.record(Outcome::Up, dec!(0.55));
        t.record(Outcome::Down, dec!(0.45));

        t.clear(None);
        assert_eq!(t.history_count(Outcome::Up), 0);
        assert_eq!(t.history_count(Outcome::Down), 0);
    }

    #[test]
    fn test_record_prices_batch() {
        let mut t = tracker();
        let prices = HashMap::from([(Outcome::Up, dec!(0.55)), (Outcome::Down, dec!(0.45))]);
        t.record_prices(&prices);

        assert_eq!(t.current_price(Outcome::Up), dec!(0.55));
        assert_eq!(t.current_price(Outcome::Down), dec!(0.45));
    }
}
