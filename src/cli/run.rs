//! Run command implementation
//!
//! Wires the market watcher, price tracker, and position tracker into a
//! monitoring loop: book updates stream mid-prices into the tracker,
//! which is polled for flash crashes. Detected crashes and position
//! exits are logged; order placement stays outside this engine.

use crate::config::Config;
use crate::crash::PriceTracker;
use crate::market::{MarketWatcher, Outcome, WatcherConfig};
use crate::position::PositionTracker;
use crate::telemetry::{increment_counter, CounterMetric};
use chrono::{DateTime, Utc};
use clap::Args;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Coin to watch (overrides the config file)
    #[arg(short = 'n', long)]
    pub coin: Option<String>,
}

impl RunArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let coin = self
            .coin
            .clone()
            .unwrap_or_else(|| config.market.coin.clone());

        let watcher = MarketWatcher::new(WatcherConfig {
            coin: coin.clone(),
            check_interval: config.market.check_interval(),
            auto_switch: config.market.auto_switch,
            feed: config.feed.to_feed_config(),
        });

        let prices = Arc::new(Mutex::new(PriceTracker::new(config.crash.to_crash_config())));
        let positions = Arc::new(Mutex::new(PositionTracker::new(
            config.position.to_position_config(),
        )));

        let (book_tx, mut book_rx) = mpsc::channel(256);
        watcher.on_book_update(move |snapshot| {
            let tx = book_tx.clone();
            async move {
                tx.send(snapshot)
                    .await
                    .map_err(|e| anyhow::anyhow!("book channel closed: {}", e))
            }
        });

        // Crash detection must never span two markets' price series
        let tracker = prices.clone();
        watcher.on_market_change(move |old_slug, new_slug| {
            tracing::info!(old = old_slug, new = new_slug, "market rolled over");
            tracker.lock().unwrap().clear(None);
        });

        watcher.on_connect(|| tracing::info!("feed connected"));
        watcher.on_disconnect(|| tracing::warn!("feed disconnected"));

        if !watcher.start().await? {
            anyhow::bail!("no active {} market accepting orders", coin);
        }

        if watcher.wait_for_data(Duration::from_secs(10)).await {
            tracing::info!(coin = %coin, "receiving market data");
        } else {
            tracing::warn!(coin = %coin, "no market data yet, continuing to wait");
        }

        let lookback = config.crash.lookback_seconds as i64;
        let mut last_crash: HashMap<Outcome, DateTime<Utc>> = HashMap::new();
        let mut ticker = tokio::time::interval(Duration::from_millis(500));

        loop {
            tokio::select! {
                Some(snapshot) = book_rx.recv() => {
                    let token_ids = watcher.token_ids().await;
                    for (side, token) in &token_ids {
                        if *token == snapshot.asset_id {
                            prices.lock().unwrap().record(*side, snapshot.mid_price());
                        }
                    }
                }

                _ = ticker.tick() => {
                    let events = prices.lock().unwrap().detect_all_crashes();
                    for event in events {
                        // One log line per crash, not one per poll
                        let stale = last_crash
                            .get(&event.side)
                            .map(|t| (event.timestamp - *t).num_seconds() > lookback)
                            .unwrap_or(true);
                        if !stale {
                            continue;
                        }
                        last_crash.insert(event.side, event.timestamp);

                        increment_counter(CounterMetric::CrashesDetected);
                        tracing::info!(
                            side = %event.side,
                            old_price = %event.old_price,
                            new_price = %event.new_price,
                            drop = %event.drop,
                            drop_pct = %event.drop_percent().round_dp(1),
                            "flash crash detected"
                        );
                    }

                    let price_map: HashMap<Outcome, _> = {
                        let mut map = HashMap::new();
                        for side in Outcome::ALL {
                            map.insert(side, watcher.get_mid_price(side).await);
                        }
                        map
                    };

                    let exits = positions.lock().unwrap().check_all_exits(&price_map);
                    for (position, reason, pnl) in exits {
                        tracing::info!(
                            id = %position.id,
                            side = %position.side,
                            reason = ?reason,
                            pnl = %pnl,
                            "position exit condition met"
                        );
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutting down");
                    break;
                }
            }
        }

        watcher.stop().await;

        let stats = positions.lock().unwrap().stats();
        tracing::info!(
            trades_closed = stats.trades_closed,
            total_pnl = %stats.total_pnl,
            win_rate = %stats.win_rate.round_dp(1),
            "session summary"
        );

        Ok(())
    }
}
