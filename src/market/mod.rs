//! Market discovery and rollover module
//!
//! Finds the active 15-minute up/down market for a coin via the Gamma
//! API and keeps one feed client subscribed to it as windows roll over.

mod gamma;
mod watcher;

pub use gamma::{GammaClient, GammaConfig, GAMMA_API_URL};
pub use watcher::{MarketChangeCallback, MarketWatcher, WatcherConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Binary market outcome token label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Up,
    Down,
}

impl Outcome {
    /// Both outcomes, in the fixed scan order used throughout the engine
    pub const ALL: [Outcome; 2] = [Outcome::Up, Outcome::Down];

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Up => "up",
            Outcome::Down => "down",
        }
    }

    /// Parse an outcome label from the wire (case-insensitive)
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_lowercase().as_str() {
            "up" => Some(Outcome::Up),
            "down" => Some(Outcome::Down),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovered 15-minute market.
///
/// Immutable snapshot of a single discovery call; superseded wholesale by
/// the next discovery.
#[derive(Debug, Clone)]
pub struct MarketInfo {
    /// Market slug, e.g. "btc-updown-15m-1767638700"
    pub slug: String,
    /// Human-readable market question
    pub question: String,
    /// ISO-8601 end timestamp as returned by discovery
    pub end_date: String,
    /// Outcome token ids
    pub token_ids: HashMap<Outcome, String>,
    /// Last known outcome prices from discovery
    pub prices: HashMap<Outcome, Decimal>,
    /// Whether the market is accepting orders
    pub accepting_orders: bool,
}

impl MarketInfo {
    /// Token id for an outcome
    pub fn token(&self, outcome: Outcome) -> Option<&str> {
        self.token_ids.get(&outcome).map(|s| s.as_str())
    }

    /// The set of both outcome token ids
    pub fn token_set(&self) -> HashSet<String> {
        self.token_ids.values().cloned().collect()
    }

    /// Countdown until market end as (minutes, seconds).
    ///
    /// `None` when the end date is absent or unparseable; (0, 0) once
    /// the market has ended.
    pub fn countdown(&self) -> Option<(i64, i64)> {
        let end = self.parse_end_date()?;
        let remaining = (end - Utc::now()).num_seconds();
        if remaining <= 0 {
            return Some((0, 0));
        }
        Some((remaining / 60, remaining % 60))
    }

    /// Formatted countdown: "MM:SS", "ENDED", or "--:--" when unknown
    pub fn countdown_str(&self) -> String {
        match self.countdown() {
            None => "--:--".to_string(),
            Some((0, 0)) => "ENDED".to_string(),
            Some((mins, secs)) => format!("{:02}:{:02}", mins, secs),
        }
    }

    /// Whether the market ends within the threshold
    pub fn is_ending_soon(&self, threshold_secs: i64) -> bool {
        match self.countdown() {
            Some((mins, secs)) => mins * 60 + secs <= threshold_secs,
            None => false,
        }
    }

    /// Whether the market has ended
    pub fn has_ended(&self) -> bool {
        self.countdown() == Some((0, 0))
    }

    /// Epoch-seconds suffix embedded in the slug, if present
    pub fn slug_timestamp(&self) -> Option<i64> {
        self.slug.rsplit('-').next()?.parse().ok()
    }

    /// Parsed end date as epoch seconds
    pub fn end_timestamp(&self) -> Option<i64> {
        self.parse_end_date().map(|dt| dt.timestamp())
    }

    /// Monotonic ordering key: slug timestamp, falling back to the
    /// parsed end date. Used to decide whether a newly discovered
    /// market supersedes the current one.
    pub fn sort_key(&self) -> Option<i64> {
        self.slug_timestamp().or_else(|| self.end_timestamp())
    }

    fn parse_end_date(&self) -> Option<DateTime<Utc>> {
        if self.end_date.is_empty() {
            return None;
        }
        DateTime::parse_from_rfc3339(&self.end_date)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Trait for market discovery implementations
#[async_trait]
pub trait MarketDiscovery: Send + Sync {
    /// Discover the current accepting-orders market for a coin.
    ///
    /// `Ok(None)` means no such market right now; the caller retries on
    /// its next cycle.
    async fn discover(&self, coin: &str) -> anyhow::Result<Option<MarketInfo>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn market(slug: &str, end_date: &str) -> MarketInfo {
        MarketInfo {
            slug: slug.to_string(),
            question: "Bitcoin Up or Down?".to_string(),
            end_date: end_date.to_string(),
            token_ids: HashMap::from([
                (Outcome::Up, "tok-up".to_string()),
                (Outcome::Down, "tok-down".to_string()),
            ]),
            prices: HashMap::from([(Outcome::Up, dec!(0.55)), (Outcome::Down, dec!(0.45))]),
            accepting_orders: true,
        }
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::from_label("Up"), Some(Outcome::Up));
        assert_eq!(Outcome::from_label("DOWN"), Some(Outcome::Down));
        assert_eq!(Outcome::from_label("maybe"), None);
        assert_eq!(Outcome::Up.to_string(), "up");
    }

    #[test]
    fn test_token_accessors() {
        let m = market("btc-updown-15m-1767638700", "");
        assert_eq!(m.token(Outcome::Up), Some("tok-up"));
        assert_eq!(m.token_set().len(), 2);
    }

    #[test]
    fn test_slug_timestamp() {
        let m = market("btc-updown-15m-1767638700", "");
        assert_eq!(m.slug_timestamp(), Some(1767638700));

        let m = market("btc-updown-15m", "");
        assert_eq!(m.slug_timestamp(), None);

        let m = market("", "");
        assert_eq!(m.slug_timestamp(), None);
    }

    #[test]
    fn test_end_timestamp() {
        let m = market("x", "2024-01-15T10:15:00Z");
        assert_eq!(m.end_timestamp(), Some(1705313700));

        let m = market("x", "not a date");
        assert_eq!(m.end_timestamp(), None);
    }

    #[test]
    fn test_sort_key_prefers_slug() {
        let m = market("btc-updown-15m-1767638700", "2024-01-15T10:15:00Z");
        assert_eq!(m.sort_key(), Some(1767638700));

        let m = market("no-suffix-slug", "2024-01-15T10:15:00Z");
        assert_eq!(m.sort_key(), Some(1705313700));

        let m = market("no-suffix-slug", "");
        assert_eq!(m.sort_key(), None);
    }

    #[test]
    fn test_countdown_ended_market() {
        let m = market("x", "2020-01-01T00:00:00Z");
        assert_eq!(m.countdown(), Some((0, 0)));
        assert!(m.has_ended());
        assert_eq!(m.countdown_str(), "ENDED");
        assert!(m.is_ending_soon(60));
    }

    #[test]
    fn test_countdown_unknown() {
        let m = market("x", "");
        assert_eq!(m.countdown(), None);
        assert!(!m.has_ended());
        assert_eq!(m.countdown_str(), "--:--");
        assert!(!m.is_ending_soon(60));
    }

    #[test]
    fn test_countdown_future_market() {
        let end = (Utc::now() + chrono::Duration::seconds(600)).to_rfc3339();
        let m = market("x", &end);
        let (mins, _secs) = m.countdown().unwrap();
        assert!((9..=10).contains(&mins));
        assert!(!m.has_ended());
        assert!(!m.is_ending_soon(60));
        assert!(m.is_ending_soon(700));
    }
}
