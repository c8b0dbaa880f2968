//! poly-flash: Real-time market data and flash-crash engine for
//! Polymarket 15-minute up/down markets
//!
//! This library provides the core components for:
//! - Streaming order books from the Polymarket CLOB WebSocket
//! - Market discovery and automatic rollover via the Gamma API
//! - Flash crash detection over bounded price history
//! - Position tracking with fixed-delta TP/SL and PnL statistics
//! - Structured logging and Prometheus metrics

pub mod cli;
pub mod config;
pub mod crash;
pub mod feed;
pub mod market;
pub mod orderbook;
pub mod position;
pub mod telemetry;
