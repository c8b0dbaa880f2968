//! Streaming market-data client
//!
//! Owns one logical WebSocket connection to the Polymarket CLOB market
//! channel, the desired subscription set, and the freshest order book per
//! subscribed token. Reconnects on failure with a fixed interval and
//! dispatches parsed events to registered callbacks in arrival order.

use super::types::{
    BookCallback, BookEvent, ConnectionCallback, ErrorCallback, FeedConfig, FeedError, LastTrade,
    MarketSubscription, PriceChange, PriceChangeCallback, PriceChangeEvent, RawLastTrade,
    SubscriptionOp, TradeCallback,
};
use crate::orderbook::OrderbookSnapshot;
use crate::telemetry::{increment_counter, CounterMetric};
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Callback slots, one per event class
#[derive(Default)]
struct Callbacks {
    book: std::sync::RwLock<Option<BookCallback>>,
    price_change: std::sync::RwLock<Option<PriceChangeCallback>>,
    trade: std::sync::RwLock<Option<TradeCallback>>,
    connect: std::sync::RwLock<Option<ConnectionCallback>>,
    disconnect: std::sync::RwLock<Option<ConnectionCallback>>,
    error: std::sync::RwLock<Option<ErrorCallback>>,
}

struct FeedShared {
    config: FeedConfig,
    running: AtomicBool,
    connected: AtomicBool,
    /// Desired subscription set; resent in full after every connect
    subscribed: tokio::sync::RwLock<HashSet<String>>,
    /// Latest snapshot per token, replaced wholesale on every book event
    books: tokio::sync::RwLock<HashMap<String, OrderbookSnapshot>>,
    /// Outbound queue of the live connection, if any
    outbound: std::sync::Mutex<Option<mpsc::UnboundedSender<Message>>>,
    callbacks: Callbacks,
}

/// WebSocket client for Polymarket market data.
///
/// Cheap to clone; all clones share connection state, subscriptions, and
/// the order book cache.
#[derive(Clone)]
pub struct MarketFeed {
    shared: Arc<FeedShared>,
}

impl MarketFeed {
    /// Create a feed client with default configuration
    pub fn new() -> Self {
        Self::with_config(FeedConfig::default())
    }

    /// Create a feed client with custom configuration
    pub fn with_config(config: FeedConfig) -> Self {
        Self {
            shared: Arc::new(FeedShared {
                config,
                running: AtomicBool::new(false),
                connected: AtomicBool::new(false),
                subscribed: tokio::sync::RwLock::new(HashSet::new()),
                books: tokio::sync::RwLock::new(HashMap::new()),
                outbound: std::sync::Mutex::new(None),
                callbacks: Callbacks::default(),
            }),
        }
    }

    /// Whether the WebSocket is currently open
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Whether the run loop is active
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Get the cached order book for a token
    pub async fn get_orderbook(&self, asset_id: &str) -> Option<OrderbookSnapshot> {
        self.shared.books.read().await.get(asset_id).cloned()
    }

    /// Get the mid price for a token, 0 if no book is cached
    pub async fn get_mid_price(&self, asset_id: &str) -> Decimal {
        self.shared
            .books
            .read()
            .await
            .get(asset_id)
            .map(|b| b.mid_price())
            .unwrap_or(Decimal::ZERO)
    }

    /// Snapshot of all cached order books
    pub async fn orderbooks(&self) -> HashMap<String, OrderbookSnapshot> {
        self.shared.books.read().await.clone()
    }

    /// Current desired subscription set
    pub async fn subscribed_assets(&self) -> HashSet<String> {
        self.shared.subscribed.read().await.clone()
    }

    /// Set the book update listener
    pub fn on_book<F, Fut>(&self, f: F)
    where
        F: Fn(OrderbookSnapshot) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let cb: BookCallback = Arc::new(move |snapshot| Box::pin(f(snapshot)));
        *self.shared.callbacks.book.write().unwrap() = Some(cb);
    }

    /// Set the price change listener
    pub fn on_price_change<F, Fut>(&self, f: F)
    where
        F: Fn(String, Vec<PriceChange>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let cb: PriceChangeCallback = Arc::new(move |market, changes| Box::pin(f(market, changes)));
        *self.shared.callbacks.price_change.write().unwrap() = Some(cb);
    }

    /// Set the trade listener
    pub fn on_trade<F, Fut>(&self, f: F)
    where
        F: Fn(LastTrade) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let cb: TradeCallback = Arc::new(move |trade| Box::pin(f(trade)));
        *self.shared.callbacks.trade.write().unwrap() = Some(cb);
    }

    /// Set the connect listener
    pub fn on_connect<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.shared.callbacks.connect.write().unwrap() = Some(Arc::new(f));
    }

    /// Set the disconnect listener
    pub fn on_disconnect<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.shared.callbacks.disconnect.write().unwrap() = Some(Arc::new(f));
    }

    /// Set the error listener
    pub fn on_error<F>(&self, f: F)
    where
        F: Fn(&FeedError) + Send + Sync + 'static,
    {
        *self.shared.callbacks.error.write().unwrap() = Some(Arc::new(f));
    }

    /// Subscribe to market data for tokens.
    ///
    /// With `replace`, the desired set and the order book cache are
    /// cleared first; used on market rollover so no stale-token data
    /// leaks across markets. If connected, a full `MARKET` subscription
    /// frame is sent immediately; otherwise the set is sent right after
    /// the next successful connect.
    ///
    /// Always succeeds locally; returns false only for an empty id list
    /// or a failed send. Send failures go to the error callback, never
    /// to the caller.
    pub async fn subscribe(&self, asset_ids: &[String], replace: bool) -> bool {
        if asset_ids.is_empty() {
            return false;
        }

        if replace {
            self.shared.subscribed.write().await.clear();
            self.shared.books.write().await.clear();
        }

        self.shared
            .subscribed
            .write()
            .await
            .extend(asset_ids.iter().cloned());

        if !self.is_connected() {
            tracing::debug!(
                count = asset_ids.len(),
                "not connected; subscription deferred until connect"
            );
            return true;
        }

        let frame = MarketSubscription::new(asset_ids.to_vec());
        self.send_json(&frame)
    }

    /// Subscribe to additional tokens without touching existing ones
    pub async fn subscribe_more(&self, asset_ids: &[String]) -> bool {
        if asset_ids.is_empty() {
            return false;
        }

        self.shared
            .subscribed
            .write()
            .await
            .extend(asset_ids.iter().cloned());

        if !self.is_connected() {
            return true;
        }

        let frame = SubscriptionOp::subscribe(asset_ids.to_vec());
        self.send_json(&frame)
    }

    /// Unsubscribe from tokens
    pub async fn unsubscribe(&self, asset_ids: &[String]) -> bool {
        if asset_ids.is_empty() {
            return false;
        }

        {
            let mut subscribed = self.shared.subscribed.write().await;
            for id in asset_ids {
                subscribed.remove(id);
            }
        }

        if !self.is_connected() {
            return false;
        }

        let frame = SubscriptionOp::unsubscribe(asset_ids.to_vec());
        self.send_json(&frame)
    }

    /// Run the feed client.
    ///
    /// Connects, resends the full desired subscription set, then reads
    /// frames until the connection closes. Connect failures and dropped
    /// connections are reported through the error callback; with
    /// `auto_reconnect` the loop sleeps the fixed reconnect interval and
    /// tries again, otherwise it returns.
    pub async fn run(&self, auto_reconnect: bool) {
        self.shared.running.store(true, Ordering::SeqCst);

        while self.is_running() {
            let ws_stream = match connect_async(&self.shared.config.url).await {
                Ok((stream, _response)) => stream,
                Err(e) => {
                    let err = FeedError::ConnectFailed(e.to_string());
                    tracing::error!(error = %err, url = %self.shared.config.url, "feed connect failed");
                    self.dispatch_error(&err);

                    if auto_reconnect && self.is_running() {
                        increment_counter(CounterMetric::FeedReconnects);
                        sleep(self.shared.config.reconnect_interval).await;
                        continue;
                    }
                    break;
                }
            };

            tracing::info!(url = %self.shared.config.url, "feed connected");

            let (mut write, mut read) = ws_stream.split();
            let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
            *self.shared.outbound.lock().unwrap() = Some(out_tx);
            self.shared.connected.store(true, Ordering::SeqCst);
            self.dispatch_connect();

            // Resend the full desired set; idempotent, and covers ids
            // that were requested before this connect.
            let assets: Vec<String> = self.shared.subscribed.read().await.iter().cloned().collect();
            if !assets.is_empty() {
                tracing::info!(count = assets.len(), "resubscribing after connect");
                let _ = self.send_json(&MarketSubscription::new(assets));
            }

            let recv_timeout = self.shared.config.recv_timeout();
            let mut ping_timer = tokio::time::interval(self.shared.config.ping_interval);
            ping_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick of a tokio interval fires immediately
            ping_timer.tick().await;
            let mut waiting_for_pong = false;

            let close_reason: Option<FeedError> = loop {
                if !self.is_running() {
                    break None;
                }

                tokio::select! {
                    msg = tokio::time::timeout(recv_timeout, read.next()) => {
                        match msg {
                            // Recoverable: keep waiting on the same connection
                            Err(_elapsed) => {
                                tracing::warn!("feed receive timeout");
                            }
                            Ok(Some(Ok(Message::Text(text)))) => {
                                self.handle_frame(&text).await;
                            }
                            Ok(Some(Ok(Message::Ping(data)))) => {
                                if let Err(e) = write.send(Message::Pong(data)).await {
                                    break Some(FeedError::SendFailed(e.to_string()));
                                }
                            }
                            Ok(Some(Ok(Message::Pong(_)))) => {
                                waiting_for_pong = false;
                            }
                            Ok(Some(Ok(Message::Close(_)))) => {
                                tracing::info!("feed received close frame");
                                break None;
                            }
                            Ok(Some(Ok(_))) => {
                                // Binary and raw frames are not part of this feed
                            }
                            Ok(Some(Err(e))) => {
                                break Some(FeedError::Closed(e.to_string()));
                            }
                            Ok(None) => {
                                break Some(FeedError::Closed("stream ended".to_string()));
                            }
                        }
                    }

                    out = out_rx.recv() => {
                        if let Some(message) = out {
                            let is_close = matches!(message, Message::Close(_));
                            if let Err(e) = write.send(message).await {
                                break Some(FeedError::SendFailed(e.to_string()));
                            }
                            if is_close {
                                break None;
                            }
                        }
                    }

                    _ = ping_timer.tick() => {
                        if waiting_for_pong {
                            break Some(FeedError::Closed("pong timeout".to_string()));
                        }
                        if let Err(e) = write.send(Message::Ping(vec![])).await {
                            break Some(FeedError::SendFailed(e.to_string()));
                        }
                        waiting_for_pong = true;
                    }
                }
            };

            *self.shared.outbound.lock().unwrap() = None;

            if let Some(err) = close_reason {
                tracing::warn!(error = %err, "feed connection lost");
                self.dispatch_error(&err);
            }

            // Exactly once per lost open connection, never per retry
            if self.shared.connected.swap(false, Ordering::SeqCst) {
                self.dispatch_disconnect();
            }

            if !self.is_running() {
                break;
            }

            if auto_reconnect {
                tracing::info!(
                    interval_secs = self.shared.config.reconnect_interval.as_secs(),
                    "feed reconnecting"
                );
                increment_counter(CounterMetric::FeedReconnects);
                sleep(self.shared.config.reconnect_interval).await;
            } else {
                break;
            }
        }

        self.shared.running.store(false, Ordering::SeqCst);
    }

    /// Stop the run loop at its next wakeup
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
    }

    /// Disconnect deterministically: stop the loop, queue a close frame,
    /// and fire the disconnect callback if a connection was open.
    pub async fn disconnect(&self) {
        self.shared.running.store(false, Ordering::SeqCst);

        let tx = self.shared.outbound.lock().unwrap().take();
        if let Some(tx) = tx {
            let _ = tx.send(Message::Close(None));
        }

        if self.shared.connected.swap(false, Ordering::SeqCst) {
            tracing::info!("feed disconnected");
            self.dispatch_disconnect();
        }
    }

    /// Queue a JSON frame on the live connection
    fn send_json<T: serde::Serialize>(&self, frame: &T) -> bool {
        let text = match serde_json::to_string(frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode frame");
                return false;
            }
        };

        let tx = self.shared.outbound.lock().unwrap().clone();
        match tx {
            Some(tx) if tx.send(Message::Text(text)).is_ok() => true,
            _ => {
                let err = FeedError::SendFailed("connection gone".to_string());
                tracing::error!(error = %err, "failed to queue frame");
                self.dispatch_error(&err);
                false
            }
        }
    }

    /// Parse one wire frame: a single event object or an array of them,
    /// each handled independently in order.
    async fn handle_frame(&self, text: &str) {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    preview = %text.chars().take(100).collect::<String>(),
                    "failed to parse frame"
                );
                return;
            }
        };

        match value {
            serde_json::Value::Array(items) => {
                for item in &items {
                    self.handle_event(item).await;
                }
            }
            other => self.handle_event(&other).await,
        }
    }

    /// Dispatch one parsed event by kind. Unknown kinds are ignored so a
    /// new server-side event type never breaks the read loop.
    async fn handle_event(&self, event: &serde_json::Value) {
        let event_type = event
            .get("event_type")
            .and_then(|v| v.as_str())
            .unwrap_or("");

        match event_type {
            "book" => {
                let book: BookEvent = match serde_json::from_value(event.clone()) {
                    Ok(b) => b,
                    Err(e) => {
                        tracing::warn!(error = %e, "malformed book event");
                        return;
                    }
                };

                let snapshot = OrderbookSnapshot::from_event(&book);
                tracing::debug!(
                    asset_id = %snapshot.asset_id,
                    bid_count = snapshot.bids.len(),
                    ask_count = snapshot.asks.len(),
                    mid = %snapshot.mid_price(),
                    "book update"
                );

                self.shared
                    .books
                    .write()
                    .await
                    .insert(snapshot.asset_id.clone(), snapshot.clone());
                increment_counter(CounterMetric::BookEvents);

                let cb = self.shared.callbacks.book.read().unwrap().clone();
                if let Some(cb) = cb {
                    if let Err(e) = cb(snapshot).await {
                        tracing::error!(error = %e, "book callback failed");
                    }
                }
            }
            "price_change" => {
                let msg: PriceChangeEvent = match serde_json::from_value(event.clone()) {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!(error = %e, "malformed price_change event");
                        return;
                    }
                };

                let changes: Vec<PriceChange> =
                    msg.price_changes.iter().map(PriceChange::from_raw).collect();
                increment_counter(CounterMetric::PriceChangeEvents);

                let cb = self.shared.callbacks.price_change.read().unwrap().clone();
                if let Some(cb) = cb {
                    if let Err(e) = cb(msg.market, changes).await {
                        tracing::error!(error = %e, "price change callback failed");
                    }
                }
            }
            "last_trade_price" => {
                let raw: RawLastTrade = match serde_json::from_value(event.clone()) {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::warn!(error = %e, "malformed last_trade_price event");
                        return;
                    }
                };

                let trade = LastTrade::from_raw(&raw);
                increment_counter(CounterMetric::TradeEvents);

                let cb = self.shared.callbacks.trade.read().unwrap().clone();
                if let Some(cb) = cb {
                    if let Err(e) = cb(trade).await {
                        tracing::error!(error = %e, "trade callback failed");
                    }
                }
            }
            "tick_size_change" => {
                tracing::debug!("tick size change event");
            }
            other => {
                tracing::debug!(event_type = other, "unknown event type");
            }
        }
    }

    fn dispatch_connect(&self) {
        let cb = self.shared.callbacks.connect.read().unwrap().clone();
        if let Some(cb) = cb {
            cb();
        }
    }

    fn dispatch_disconnect(&self) {
        let cb = self.shared.callbacks.disconnect.read().unwrap().clone();
        if let Some(cb) = cb {
            cb();
        }
    }

    fn dispatch_error(&self, err: &FeedError) {
        let cb = self.shared.callbacks.error.read().unwrap().clone();
        if let Some(cb) = cb {
            cb(err);
        }
    }
}

impl Default for MarketFeed {
    fn default() -> Self {
        Self::new()
    }
}
