//! Integration tests for market discovery and switching

use async_trait::async_trait;
use poly_flash::feed::FeedConfig;
use poly_flash::market::{MarketDiscovery, MarketInfo, MarketWatcher, Outcome, WatcherConfig};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct ScriptedDiscovery {
    market: Mutex<Option<MarketInfo>>,
}

#[async_trait]
impl MarketDiscovery for ScriptedDiscovery {
    async fn discover(&self, _coin: &str) -> anyhow::Result<Option<MarketInfo>> {
        Ok(self.market.lock().unwrap().clone())
    }
}

fn window_market(ts: i64, up: &str, down: &str) -> MarketInfo {
    MarketInfo {
        slug: format!("btc-updown-15m-{}", ts),
        question: "Bitcoin Up or Down?".to_string(),
        end_date: String::new(),
        token_ids: HashMap::from([
            (Outcome::Up, up.to_string()),
            (Outcome::Down, down.to_string()),
        ]),
        prices: HashMap::from([(Outcome::Up, dec!(0.5)), (Outcome::Down, dec!(0.5))]),
        accepting_orders: true,
    }
}

fn offline_config() -> WatcherConfig {
    WatcherConfig {
        coin: "BTC".to_string(),
        check_interval: Duration::from_secs(3600),
        auto_switch: true,
        feed: FeedConfig::new("wss://invalid.localhost.test:12345")
            .reconnect_interval(Duration::from_secs(3600)),
    }
}

#[tokio::test]
async fn test_market_rollover_resubscribes_then_notifies() {
    let discovery = Arc::new(ScriptedDiscovery {
        market: Mutex::new(Some(window_market(1000, "a-up", "a-down"))),
    });
    let watcher = MarketWatcher::with_discovery(offline_config(), discovery.clone());

    assert!(watcher.start().await.unwrap());

    let changes = Arc::new(Mutex::new(Vec::<(String, String)>::new()));
    let seen = changes.clone();
    watcher.on_market_change(move |old_slug, new_slug| {
        seen.lock()
            .unwrap()
            .push((old_slug.to_string(), new_slug.to_string()));
    });

    // Next quarter-hour window appears
    *discovery.market.lock().unwrap() = Some(window_market(1900, "b-up", "b-down"));
    let market = watcher.refresh_market().await.unwrap().unwrap();
    assert_eq!(market.slug, "btc-updown-15m-1900");

    let feed = watcher.feed().await.unwrap();
    let subscribed = feed.subscribed_assets().await;
    assert!(subscribed.contains("b-up"));
    assert!(subscribed.contains("b-down"));
    assert!(!subscribed.contains("a-up"));

    let events = changes.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![(
            "btc-updown-15m-1000".to_string(),
            "btc-updown-15m-1900".to_string()
        )]
    );

    watcher.stop().await;
}

#[tokio::test]
async fn test_unchanged_market_never_notifies() {
    let discovery = Arc::new(ScriptedDiscovery {
        market: Mutex::new(Some(window_market(1000, "a-up", "a-down"))),
    });
    let watcher = MarketWatcher::with_discovery(offline_config(), discovery.clone());
    watcher.start().await.unwrap();

    let changes = Arc::new(Mutex::new(Vec::<(String, String)>::new()));
    let seen = changes.clone();
    watcher.on_market_change(move |old_slug, new_slug| {
        seen.lock()
            .unwrap()
            .push((old_slug.to_string(), new_slug.to_string()));
    });

    for _ in 0..3 {
        watcher.refresh_market().await.unwrap();
    }

    assert!(changes.lock().unwrap().is_empty());

    watcher.stop().await;
}

#[tokio::test]
async fn test_discovery_race_keeps_current_market() {
    let discovery = Arc::new(ScriptedDiscovery {
        market: Mutex::new(Some(window_market(2000, "b-up", "b-down"))),
    });
    let watcher = MarketWatcher::with_discovery(offline_config(), discovery.clone());
    watcher.start().await.unwrap();

    // A stale discovery response resolves after the switch
    *discovery.market.lock().unwrap() = Some(window_market(1100, "a-up", "a-down"));
    let market = watcher.refresh_market().await.unwrap().unwrap();

    assert_eq!(market.slug, "btc-updown-15m-2000");
    let feed = watcher.feed().await.unwrap();
    assert!(feed.subscribed_assets().await.contains("b-up"));

    watcher.stop().await;
}
