//! Gamma API client for market discovery
//!
//! Resolves the active 15-minute up/down market for a coin by probing
//! slug-addressed market windows. Slugs carry the epoch second of their
//! quarter-hour boundary, so the current, next, and previous windows can
//! be addressed directly without listing.

use super::{MarketDiscovery, MarketInfo, Outcome};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Gamma API base URL
pub const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";

/// Seconds per 15-minute market window
const WINDOW_SECS: i64 = 900;

/// Configuration for the Gamma client
#[derive(Debug, Clone)]
pub struct GammaConfig {
    /// Base URL for the Gamma API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for GammaConfig {
    fn default() -> Self {
        Self {
            base_url: GAMMA_API_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Client for Polymarket's Gamma API
pub struct GammaClient {
    config: GammaConfig,
    client: Client,
}

impl GammaClient {
    /// Create a new Gamma API client with default configuration
    pub fn new() -> Self {
        Self::with_config(GammaConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: GammaConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Slug prefix for a supported coin
    fn slug_prefix(coin: &str) -> Option<&'static str> {
        match coin.to_uppercase().as_str() {
            "BTC" => Some("btc-updown-15m"),
            "ETH" => Some("eth-updown-15m"),
            "SOL" => Some("sol-updown-15m"),
            "XRP" => Some("xrp-updown-15m"),
            _ => None,
        }
    }

    /// Fetch a market by slug. Missing markets and HTTP errors both map
    /// to `Ok(None)`: an absent window is routine during rollover.
    pub async fn market_by_slug(&self, slug: &str) -> anyhow::Result<Option<GammaMarket>> {
        let url = format!("{}/markets/slug/{}", self.config.base_url, slug);

        tracing::debug!(url = %url, "fetching market by slug");

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, slug = %slug, "market fetch failed");
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            return Ok(None);
        }

        Ok(response.json().await.ok())
    }

    /// Find the current accepting-orders 15-minute market for a coin.
    ///
    /// Probes the current window, then the next (the current one may
    /// have just closed), then the previous (may still be accepting).
    pub async fn current_market(&self, coin: &str) -> anyhow::Result<Option<MarketInfo>> {
        let prefix = Self::slug_prefix(coin)
            .ok_or_else(|| anyhow::anyhow!("unsupported coin: {} (use BTC, ETH, SOL, XRP)", coin))?;

        let window = current_window_ts(Utc::now().timestamp());

        for ts in [window, window + WINDOW_SECS, window - WINDOW_SECS] {
            let slug = format!("{}-{}", prefix, ts);
            if let Some(market) = self.market_by_slug(&slug).await? {
                if market.accepting_orders {
                    tracing::info!(slug = %slug, "discovered active market");
                    return Ok(Some(market.into_info()));
                }
            }
        }

        tracing::debug!(coin = %coin, "no accepting-orders market found");
        Ok(None)
    }
}

impl Default for GammaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDiscovery for GammaClient {
    async fn discover(&self, coin: &str) -> anyhow::Result<Option<MarketInfo>> {
        self.current_market(coin).await
    }
}

/// Floor an epoch second to its 15-minute window boundary
fn current_window_ts(now_secs: i64) -> i64 {
    now_secs - now_secs.rem_euclid(WINDOW_SECS)
}

/// Raw market response from the Gamma API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaMarket {
    /// Market slug
    #[serde(default)]
    pub slug: String,
    /// Market question
    #[serde(default)]
    pub question: String,
    /// Market end date (ISO-8601)
    #[serde(default)]
    pub end_date: String,
    /// Outcome token ids as a JSON-encoded string array
    pub clob_token_ids: Option<String>,
    /// Outcome labels as a JSON-encoded string array
    pub outcomes: Option<String>,
    /// Outcome prices as a JSON-encoded string array
    pub outcome_prices: Option<String>,
    /// Whether the market is accepting orders
    #[serde(default)]
    pub accepting_orders: bool,
}

impl GammaMarket {
    /// Convert the raw payload into a MarketInfo, mapping outcome labels
    /// to token ids and prices
    pub fn into_info(self) -> MarketInfo {
        let outcomes = parse_json_list(self.outcomes.as_deref().unwrap_or(r#"["Up", "Down"]"#));
        let tokens = parse_json_list(self.clob_token_ids.as_deref().unwrap_or("[]"));
        let prices = parse_json_list(self.outcome_prices.as_deref().unwrap_or(r#"["0.5", "0.5"]"#));

        let mut token_ids = HashMap::new();
        let mut price_map = HashMap::new();

        for (i, label) in outcomes.iter().enumerate() {
            let Some(outcome) = Outcome::from_label(label) else {
                continue;
            };
            if let Some(token) = tokens.get(i) {
                token_ids.insert(outcome, token.clone());
            }
            if let Some(price) = prices.get(i).and_then(|p| Decimal::from_str(p).ok()) {
                price_map.insert(outcome, price);
            }
        }

        MarketInfo {
            slug: self.slug,
            question: self.question,
            end_date: self.end_date,
            token_ids,
            prices: price_map,
            accepting_orders: self.accepting_orders,
        }
    }
}

/// Parse a field that arrives as a JSON-encoded string array
fn parse_json_list(value: &str) -> Vec<String> {
    serde_json::from_str(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_gamma_config_default() {
        let config = GammaConfig::default();
        assert_eq!(config.base_url, GAMMA_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_slug_prefix() {
        assert_eq!(GammaClient::slug_prefix("btc"), Some("btc-updown-15m"));
        assert_eq!(GammaClient::slug_prefix("ETH"), Some("eth-updown-15m"));
        assert_eq!(GammaClient::slug_prefix("DOGE"), None);
    }

    #[test]
    fn test_current_window_ts() {
        // 2024-01-01 00:07:13 UTC floors to 00:00:00
        assert_eq!(current_window_ts(1704067633), 1704067200);
        // Exact boundary stays put
        assert_eq!(current_window_ts(1704067200), 1704067200);
        assert_eq!(current_window_ts(1704067200 + 899), 1704067200);
        assert_eq!(current_window_ts(1704067200 + 900), 1704068100);
    }

    #[test]
    fn test_parse_json_list() {
        assert_eq!(
            parse_json_list(r#"["a", "b"]"#),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(parse_json_list("garbage").is_empty());
    }

    #[test]
    fn test_into_info() {
        let raw = GammaMarket {
            slug: "btc-updown-15m-1767638700".to_string(),
            question: "Bitcoin Up or Down?".to_string(),
            end_date: "2026-01-05T18:15:00Z".to_string(),
            clob_token_ids: Some(r#"["tok-up-id", "tok-down-id"]"#.to_string()),
            outcomes: Some(r#"["Up", "Down"]"#.to_string()),
            outcome_prices: Some(r#"["0.55", "0.45"]"#.to_string()),
            accepting_orders: true,
        };

        let info = raw.into_info();
        assert_eq!(info.slug, "btc-updown-15m-1767638700");
        assert_eq!(info.token(Outcome::Up), Some("tok-up-id"));
        assert_eq!(info.token(Outcome::Down), Some("tok-down-id"));
        assert_eq!(info.prices[&Outcome::Up], dec!(0.55));
        assert!(info.accepting_orders);
        assert_eq!(info.sort_key(), Some(1767638700));
    }

    #[test]
    fn test_into_info_missing_fields() {
        let raw = GammaMarket {
            slug: "x".to_string(),
            question: String::new(),
            end_date: String::new(),
            clob_token_ids: None,
            outcomes: None,
            outcome_prices: None,
            accepting_orders: false,
        };

        let info = raw.into_info();
        assert!(info.token_ids.is_empty());
        // Default outcome prices fall back to the neutral prior
        assert_eq!(info.prices[&Outcome::Up], dec!(0.5));
        assert!(!info.accepting_orders);
    }

    #[test]
    fn test_into_info_unknown_outcome_labels() {
        let raw = GammaMarket {
            slug: "x".to_string(),
            question: String::new(),
            end_date: String::new(),
            clob_token_ids: Some(r#"["t1", "t2"]"#.to_string()),
            outcomes: Some(r#"["Yes", "No"]"#.to_string()),
            outcome_prices: None,
            accepting_orders: true,
        };

        // Labels that are not up/down are skipped, not mis-mapped
        let info = raw.into_info();
        assert!(info.token_ids.is_empty());
    }
}
