//! Prometheus metrics

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Book snapshot events received
    BookEvents,
    /// Price change events received
    PriceChangeEvents,
    /// Trade events received
    TradeEvents,
    /// Feed reconnection attempts
    FeedReconnects,
    /// Market rollover switches
    MarketSwitches,
    /// Flash crashes detected
    CrashesDetected,
    /// Positions opened
    PositionsOpened,
    /// Positions closed
    PositionsClosed,
}

impl CounterMetric {
    fn name(&self) -> &'static str {
        match self {
            CounterMetric::BookEvents => "polyflash_book_events_total",
            CounterMetric::PriceChangeEvents => "polyflash_price_change_events_total",
            CounterMetric::TradeEvents => "polyflash_trade_events_total",
            CounterMetric::FeedReconnects => "polyflash_feed_reconnects_total",
            CounterMetric::MarketSwitches => "polyflash_market_switches_total",
            CounterMetric::CrashesDetected => "polyflash_crashes_detected_total",
            CounterMetric::PositionsOpened => "polyflash_positions_opened_total",
            CounterMetric::PositionsClosed => "polyflash_positions_closed_total",
        }
    }
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Open position count
    OpenPositions,
    /// Realized P&L
    RealizedPnl,
}

impl GaugeMetric {
    fn name(&self) -> &'static str {
        match self {
            GaugeMetric::OpenPositions => "polyflash_open_positions",
            GaugeMetric::RealizedPnl => "polyflash_realized_pnl_usd",
        }
    }
}

/// Increment a counter
pub fn increment_counter(metric: CounterMetric) {
    metrics::counter!(metric.name()).increment(1);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}

/// Install the Prometheus exporter on the given port
pub(crate) fn install_prometheus(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;

    Ok(())
}
