//! End-to-end integration tests

use poly_flash::config::Config;
use poly_flash::crash::{CrashConfig, PriceTracker};
use poly_flash::market::Outcome;
use poly_flash::position::{ExitReason, PositionConfig, PositionTracker};
use rust_decimal_macros::dec;
use std::collections::HashMap;

#[test]
fn test_config_example_parses() {
    let toml = r#"
        [market]
        coin = "BTC"
        check_interval_secs = 30
        auto_switch = true

        [feed]
        ws_url = "wss://ws-subscriptions-clob.polymarket.com/ws/market"
        reconnect_interval_secs = 5
        ping_interval_secs = 20
        ping_timeout_secs = 10

        [crash]
        lookback_seconds = 10
        drop_threshold = 0.30
        max_history = 100

        [position]
        take_profit = 0.10
        stop_loss = 0.05
        max_positions = 1
        trade_size = 10.0

        [telemetry]
        metrics_port = 9090
        log_level = "info"
    "#;

    let config: Config = toml::from_str(toml).unwrap();
    assert_eq!(config.market.coin, "BTC");
    assert_eq!(config.crash.drop_threshold, dec!(0.30));
    assert_eq!(config.position.trade_size, dec!(10.0));
}

#[test]
fn test_crash_detection_to_position_exit_flow() {
    let mut prices = PriceTracker::new(CrashConfig {
        lookback_seconds: 10,
        drop_threshold: dec!(0.30),
        max_history: 100,
    });
    let mut positions = PositionTracker::new(PositionConfig {
        take_profit: dec!(0.10),
        stop_loss: dec!(0.05),
        max_positions: 1,
    });

    // Stable market, then a collapse on the Up side
    let now = chrono::Utc::now();
    prices.record_at(Outcome::Up, dec!(0.55), now - chrono::Duration::seconds(8));
    prices.record_at(Outcome::Up, dec!(0.54), now - chrono::Duration::seconds(5));
    prices.record_at(Outcome::Up, dec!(0.20), now);

    let event = prices.detect_flash_crash(None).expect("crash expected");
    assert_eq!(event.side, Outcome::Up);
    assert_eq!(event.drop, dec!(0.35));

    // Strategy layer reacts by buying the crashed side
    let position = positions
        .open_position(event.side, "tok-up", event.new_price, dec!(10), None)
        .expect("position should open");

    // A second crash signal cannot stack another position
    assert!(positions
        .open_position(event.side, "tok-up", dec!(0.19), dec!(10), None)
        .is_none());

    // Price mean-reverts through the take-profit line
    let price_map = HashMap::from([(Outcome::Up, dec!(0.31))]);
    let exits = positions.check_all_exits(&price_map);
    assert_eq!(exits.len(), 1);
    assert_eq!(exits[0].1, ExitReason::TakeProfit);

    let pnl = exits[0].2;
    assert_eq!(pnl, dec!(1.1));

    positions.close_position(position.id, pnl);
    let stats = positions.stats();
    assert_eq!(stats.trades_closed, 1);
    assert_eq!(stats.winning_trades, 1);
    assert_eq!(stats.total_pnl, dec!(1.1));
    assert!(positions.can_open_position());
}

#[test]
fn test_history_capacity_bound_holds_under_load() {
    let mut prices = PriceTracker::new(CrashConfig {
        max_history: 100,
        ..Default::default()
    });

    for i in 0..500 {
        prices.record(Outcome::Up, dec!(0.0001) * rust_decimal::Decimal::from(i + 1));
    }

    assert_eq!(prices.history_count(Outcome::Up), 100);
    let history = prices.history(Outcome::Up);
    // Exactly the 100 most recent observations are retained
    assert_eq!(history.first().unwrap().price, dec!(0.0001) * dec!(401));
    assert_eq!(history.last().unwrap().price, dec!(0.0001) * dec!(500));
}
