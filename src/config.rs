//! Configuration types for poly-flash

use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub crash: CrashSettings,
    #[serde(default)]
    pub position: PositionSettings,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

/// Market tracking configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Coin symbol (BTC, ETH, SOL, XRP)
    #[serde(default = "default_coin")]
    pub coin: String,

    /// Seconds between market re-discovery checks
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Switch automatically when the market rolls over
    #[serde(default = "default_true")]
    pub auto_switch: bool,
}

impl MarketConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

/// Feed connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedSettings {
    /// WebSocket endpoint for market data
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Fixed delay between reconnection attempts (seconds)
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_secs: u64,

    /// Ping interval (seconds)
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Pong timeout (seconds)
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_secs: u64,
}

impl FeedSettings {
    /// Build the feed client configuration
    pub fn to_feed_config(&self) -> crate::feed::FeedConfig {
        crate::feed::FeedConfig::new(&self.ws_url)
            .reconnect_interval(Duration::from_secs(self.reconnect_interval_secs))
            .ping_interval(Duration::from_secs(self.ping_interval_secs))
            .ping_timeout(Duration::from_secs(self.ping_timeout_secs))
    }
}

/// Flash crash detection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrashSettings {
    /// Detection window in seconds
    #[serde(default = "default_lookback")]
    pub lookback_seconds: u64,

    /// Minimum absolute probability drop to qualify
    #[serde(default = "default_drop_threshold")]
    pub drop_threshold: Decimal,

    /// Retained observations per side
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl CrashSettings {
    /// Build the detector configuration
    pub fn to_crash_config(&self) -> crate::crash::CrashConfig {
        crate::crash::CrashConfig {
            lookback_seconds: self.lookback_seconds,
            drop_threshold: self.drop_threshold,
            max_history: self.max_history,
        }
    }
}

/// Position management configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PositionSettings {
    /// Take-profit delta above entry
    #[serde(default = "default_take_profit")]
    pub take_profit: Decimal,

    /// Stop-loss delta below entry
    #[serde(default = "default_stop_loss")]
    pub stop_loss: Decimal,

    /// Maximum concurrent open positions
    #[serde(default = "default_max_positions")]
    pub max_positions: usize,

    /// Position size in dollars
    #[serde(default = "default_trade_size")]
    pub trade_size: Decimal,
}

impl PositionSettings {
    /// Build the position tracker configuration
    pub fn to_position_config(&self) -> crate::position::PositionConfig {
        crate::position::PositionConfig {
            take_profit: self.take_profit,
            stop_loss: self.stop_loss,
            max_positions: self.max_positions,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format: "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_coin() -> String {
    "BTC".to_string()
}
fn default_check_interval() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_ws_url() -> String {
    crate::feed::WSS_MARKET_URL.to_string()
}
fn default_reconnect_interval() -> u64 {
    5
}
fn default_ping_interval() -> u64 {
    20
}
fn default_ping_timeout() -> u64 {
    10
}
fn default_lookback() -> u64 {
    10
}
fn default_drop_threshold() -> Decimal {
    Decimal::new(30, 2) // 0.30
}
fn default_max_history() -> usize {
    100
}
fn default_take_profit() -> Decimal {
    Decimal::new(10, 2) // 0.10
}
fn default_stop_loss() -> Decimal {
    Decimal::new(5, 2) // 0.05
}
fn default_max_positions() -> usize {
    1
}
fn default_trade_size() -> Decimal {
    Decimal::new(10, 0) // $10
}
fn default_metrics_port() -> u16 {
    9090
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            coin: default_coin(),
            check_interval_secs: default_check_interval(),
            auto_switch: true,
        }
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            reconnect_interval_secs: default_reconnect_interval(),
            ping_interval_secs: default_ping_interval(),
            ping_timeout_secs: default_ping_timeout(),
        }
    }
}

impl Default for CrashSettings {
    fn default() -> Self {
        Self {
            lookback_seconds: default_lookback(),
            drop_threshold: default_drop_threshold(),
            max_history: default_max_history(),
        }
    }
}

impl Default for PositionSettings {
    fn default() -> Self {
        Self {
            take_profit: default_take_profit(),
            stop_loss: default_stop_loss(),
            max_positions: default_max_positions(),
            trade_size: default_trade_size(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: default_metrics_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.market.coin, "BTC");
        assert_eq!(config.market.check_interval_secs, 30);
        assert!(config.market.auto_switch);
        assert_eq!(config.crash.drop_threshold, dec!(0.30));
        assert_eq!(config.position.take_profit, dec!(0.10));
        assert_eq!(config.telemetry.metrics_port, 9090);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let toml = r#"
            [market]
            coin = "ETH"
            check_interval_secs = 15

            [crash]
            drop_threshold = 0.25
            lookback_seconds = 20

            [position]
            take_profit = 0.08
            max_positions = 2
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.market.coin, "ETH");
        assert_eq!(config.market.check_interval(), Duration::from_secs(15));
        assert_eq!(config.crash.drop_threshold, dec!(0.25));
        assert_eq!(config.crash.lookback_seconds, 20);
        assert_eq!(config.position.take_profit, dec!(0.08));
        assert_eq!(config.position.max_positions, 2);
        // Untouched sections keep defaults
        assert_eq!(config.position.stop_loss, dec!(0.05));
        assert_eq!(config.feed.reconnect_interval_secs, 5);
    }

    #[test]
    fn test_to_feed_config() {
        let settings = FeedSettings {
            ws_url: "wss://example.com".to_string(),
            reconnect_interval_secs: 3,
            ping_interval_secs: 10,
            ping_timeout_secs: 4,
        };

        let feed = settings.to_feed_config();
        assert_eq!(feed.url, "wss://example.com");
        assert_eq!(feed.reconnect_interval, Duration::from_secs(3));
        assert_eq!(feed.recv_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_to_crash_config() {
        let settings = CrashSettings::default();
        let crash = settings.to_crash_config();
        assert_eq!(crash.lookback_seconds, 10);
        assert_eq!(crash.drop_threshold, dec!(0.30));
        assert_eq!(crash.max_history, 100);
    }
}
