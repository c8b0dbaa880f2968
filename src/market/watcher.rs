//! Market watcher
//!
//! Owns one feed client subscribed to the instruments of the currently
//! active market for a coin, re-discovers the market on a fixed
//! interval, and fans book/connect/disconnect/market-change events out
//! to registered listeners.

use super::{MarketDiscovery, MarketInfo, Outcome};
use crate::feed::{BookCallback, ConnectionCallback, FeedConfig, MarketFeed};
use crate::orderbook::OrderbookSnapshot;
use crate::telemetry::{increment_counter, CounterMetric};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Market change listener: (old_slug, new_slug)
pub type MarketChangeCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Watcher configuration
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Coin symbol (BTC, ETH, SOL, XRP)
    pub coin: String,
    /// Interval between market re-discovery checks
    pub check_interval: Duration,
    /// Switch the feed automatically when the market rolls over
    pub auto_switch: bool,
    /// Feed client configuration
    pub feed: FeedConfig,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            coin: "BTC".to_string(),
            check_interval: Duration::from_secs(30),
            auto_switch: true,
            feed: FeedConfig::default(),
        }
    }
}

#[derive(Default)]
struct Listeners {
    book: std::sync::RwLock<Vec<BookCallback>>,
    market_change: std::sync::RwLock<Vec<MarketChangeCallback>>,
    connect: std::sync::RwLock<Vec<ConnectionCallback>>,
    disconnect: std::sync::RwLock<Vec<ConnectionCallback>>,
}

struct WatcherShared {
    config: WatcherConfig,
    discovery: Arc<dyn MarketDiscovery>,
    feed: tokio::sync::RwLock<Option<MarketFeed>>,
    current: tokio::sync::RwLock<Option<MarketInfo>>,
    running: AtomicBool,
    connected: AtomicBool,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    listeners: Listeners,
}

/// Orchestrates market discovery and the feed subscription lifecycle.
///
/// Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct MarketWatcher {
    shared: Arc<WatcherShared>,
}

impl MarketWatcher {
    /// Create a watcher backed by the Gamma API
    pub fn new(config: WatcherConfig) -> Self {
        Self::with_discovery(config, Arc::new(super::GammaClient::new()))
    }

    /// Create a watcher with a custom discovery implementation
    pub fn with_discovery(config: WatcherConfig, discovery: Arc<dyn MarketDiscovery>) -> Self {
        Self {
            shared: Arc::new(WatcherShared {
                config,
                discovery,
                feed: tokio::sync::RwLock::new(None),
                current: tokio::sync::RwLock::new(None),
                running: AtomicBool::new(false),
                connected: AtomicBool::new(false),
                tasks: tokio::sync::Mutex::new(Vec::new()),
                listeners: Listeners::default(),
            }),
        }
    }

    /// Whether the feed is currently connected
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Whether the watcher is running
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// The currently tracked market, if any
    pub async fn current_market(&self) -> Option<MarketInfo> {
        self.shared.current.read().await.clone()
    }

    /// The owned feed client, once started
    pub async fn feed(&self) -> Option<MarketFeed> {
        self.shared.feed.read().await.clone()
    }

    /// Token ids of the current market
    pub async fn token_ids(&self) -> HashMap<Outcome, String> {
        self.shared
            .current
            .read()
            .await
            .as_ref()
            .map(|m| m.token_ids.clone())
            .unwrap_or_default()
    }

    /// Cached order book for an outcome of the current market
    pub async fn get_orderbook(&self, side: Outcome) -> Option<OrderbookSnapshot> {
        let feed = self.shared.feed.read().await.clone()?;
        let token = {
            let current = self.shared.current.read().await;
            current.as_ref()?.token_ids.get(&side).cloned()?
        };
        feed.get_orderbook(&token).await
    }

    /// Mid price for an outcome, 0 if no book yet
    pub async fn get_mid_price(&self, side: Outcome) -> Decimal {
        match self.get_orderbook(side).await {
            Some(book) => book.mid_price(),
            None => Decimal::ZERO,
        }
    }

    /// Best bid for an outcome, 0 if no book yet
    pub async fn get_best_bid(&self, side: Outcome) -> Decimal {
        match self.get_orderbook(side).await {
            Some(book) => book.best_bid(),
            None => Decimal::ZERO,
        }
    }

    /// Best ask for an outcome, 1 if no book yet
    pub async fn get_best_ask(&self, side: Outcome) -> Decimal {
        match self.get_orderbook(side).await {
            Some(book) => book.best_ask(),
            None => Decimal::ONE,
        }
    }

    /// Spread for an outcome, 0 when there is no bid
    pub async fn get_spread(&self, side: Outcome) -> Decimal {
        match self.get_orderbook(side).await {
            Some(book) => book.spread(),
            None => Decimal::ZERO,
        }
    }

    /// Register a book update listener
    pub fn on_book_update<F, Fut>(&self, f: F)
    where
        F: Fn(OrderbookSnapshot) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let cb: BookCallback = Arc::new(move |snapshot| Box::pin(f(snapshot)));
        self.shared.listeners.book.write().unwrap().push(cb);
    }

    /// Register a market change listener
    pub fn on_market_change<F>(&self, f: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.shared
            .listeners
            .market_change
            .write()
            .unwrap()
            .push(Arc::new(f));
    }

    /// Register a connect listener
    pub fn on_connect<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared
            .listeners
            .connect
            .write()
            .unwrap()
            .push(Arc::new(f));
    }

    /// Register a disconnect listener
    pub fn on_disconnect<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared
            .listeners
            .disconnect
            .write()
            .unwrap()
            .push(Arc::new(f));
    }

    /// Start the watcher.
    ///
    /// Discovers the initial market, wires a feed client to it, and
    /// spawns the feed run loop plus (if auto-switch is on) the periodic
    /// market check loop. Returns `Ok(false)` when no accepting-orders
    /// market exists right now.
    pub async fn start(&self) -> anyhow::Result<bool> {
        let market = match self.shared.discovery.discover(&self.shared.config.coin).await? {
            Some(m) if m.accepting_orders => m,
            _ => {
                tracing::warn!(coin = %self.shared.config.coin, "no active market found");
                return Ok(false);
            }
        };

        self.shared.running.store(true, Ordering::SeqCst);

        tracing::info!(slug = %market.slug, question = %market.question, "tracking market");

        let feed = MarketFeed::with_config(self.shared.config.feed.clone());
        self.wire_feed(&feed);

        let tokens: Vec<String> = market.token_set().into_iter().collect();
        feed.subscribe(&tokens, true).await;

        *self.shared.feed.write().await = Some(feed.clone());
        *self.shared.current.write().await = Some(market);

        let mut tasks = self.shared.tasks.lock().await;

        let feed_task = tokio::spawn(async move {
            feed.run(true).await;
        });
        tasks.push(feed_task);

        if self.shared.config.auto_switch {
            let watcher = self.clone();
            let check_task = tokio::spawn(async move {
                watcher.market_check_loop().await;
            });
            tasks.push(check_task);
        }

        Ok(true)
    }

    /// Stop the watcher: cancel background tasks, disconnect the feed,
    /// clear connection state. Safe to call even if `start` never
    /// completed.
    pub async fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);

        let handles: Vec<JoinHandle<()>> = self.shared.tasks.lock().await.drain(..).collect();
        for handle in handles {
            handle.abort();
            // Cancellation is the expected exit here, not an error
            let _ = handle.await;
        }

        let feed = self.shared.feed.write().await.take();
        if let Some(feed) = feed {
            feed.disconnect().await;
        }

        self.shared.connected.store(false, Ordering::SeqCst);
    }

    /// Poll until the feed is connected and at least one side has a
    /// cached order book, or the timeout elapses.
    pub async fn wait_for_data(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;

        while tokio::time::Instant::now() < deadline {
            if self.is_connected()
                && (self.get_orderbook(Outcome::Up).await.is_some()
                    || self.get_orderbook(Outcome::Down).await.is_some())
            {
                return true;
            }
            sleep(Duration::from_millis(100)).await;
        }

        false
    }

    /// Run one market check cycle on demand.
    ///
    /// Returns the resulting (possibly unchanged) market info, or `None`
    /// when discovery found nothing this time.
    pub async fn refresh_market(&self) -> anyhow::Result<Option<MarketInfo>> {
        self.check_market_once().await
    }

    /// Wire feed callbacks that fan out to registered listeners
    fn wire_feed(&self, feed: &MarketFeed) {
        let shared = self.shared.clone();
        feed.on_book(move |snapshot| {
            let listeners: Vec<BookCallback> = shared.listeners.book.read().unwrap().clone();
            async move {
                for cb in listeners {
                    // One failing listener must not suppress the others
                    if let Err(e) = cb(snapshot.clone()).await {
                        tracing::error!(error = %e, "book listener failed");
                    }
                }
                Ok(())
            }
        });

        let shared = self.shared.clone();
        feed.on_connect(move || {
            shared.connected.store(true, Ordering::SeqCst);
            let listeners: Vec<ConnectionCallback> =
                shared.listeners.connect.read().unwrap().clone();
            for cb in listeners {
                cb();
            }
        });

        let shared = self.shared.clone();
        feed.on_disconnect(move || {
            shared.connected.store(false, Ordering::SeqCst);
            let listeners: Vec<ConnectionCallback> =
                shared.listeners.disconnect.read().unwrap().clone();
            for cb in listeners {
                cb();
            }
        });
    }

    /// Periodic market check. Discovery runs on its own task so it never
    /// stalls event dispatch.
    async fn market_check_loop(&self) {
        loop {
            sleep(self.shared.config.check_interval).await;

            if !self.is_running() {
                break;
            }

            if let Err(e) = self.check_market_once().await {
                tracing::warn!(error = %e, "market check failed");
            }
        }
    }

    async fn check_market_once(&self) -> anyhow::Result<Option<MarketInfo>> {
        let old_market = self.shared.current.read().await.clone();
        let old_tokens: HashSet<String> = old_market
            .as_ref()
            .map(|m| m.token_set())
            .unwrap_or_default();
        let old_slug = old_market.as_ref().map(|m| m.slug.clone());

        let market = match self.shared.discovery.discover(&self.shared.config.coin).await? {
            Some(m) if m.accepting_orders => m,
            _ => return Ok(None),
        };

        let new_tokens = market.token_set();
        if new_tokens == old_tokens {
            // Same instruments: refresh metadata without resubscribing
            *self.shared.current.write().await = Some(market);
            return Ok(self.shared.current.read().await.clone());
        }

        if !should_switch_market(old_market.as_ref(), &market) {
            tracing::debug!(
                old = old_slug.as_deref().unwrap_or(""),
                new = %market.slug,
                "rejecting market switch"
            );
            return Ok(old_market);
        }

        // Resubscribe before state update and listener notification so a
        // market-change listener always sees the new set subscribed.
        let tokens: Vec<String> = new_tokens.into_iter().collect();
        let feed = self.shared.feed.read().await.clone();
        if let Some(feed) = feed {
            feed.subscribe(&tokens, true).await;
        }

        *self.shared.current.write().await = Some(market.clone());

        if let Some(old_slug) = old_slug {
            if old_slug != market.slug {
                tracing::info!(old = %old_slug, new = %market.slug, "market changed");
                increment_counter(CounterMetric::MarketSwitches);

                let listeners: Vec<MarketChangeCallback> =
                    self.shared.listeners.market_change.read().unwrap().clone();
                for cb in listeners {
                    cb(&old_slug, &market.slug);
                }
            }
        }

        Ok(Some(market))
    }
}

/// Whether a newly discovered market should replace the current one.
///
/// Always replaces an absent market; never replaces an identical token
/// set; rejects markets whose ordering key does not strictly advance,
/// guarding against discovery races returning an earlier window.
fn should_switch_market(old: Option<&MarketInfo>, new: &MarketInfo) -> bool {
    let Some(old) = old else {
        return true;
    };

    if new.token_set() == old.token_set() {
        return false;
    }

    if let (Some(old_key), Some(new_key)) = (old.sort_key(), new.sort_key()) {
        if new_key <= old_key {
            return false;
        }
    }

    true
}
