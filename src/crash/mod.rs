//! Flash crash detection module
//!
//! Bounded per-side price history and detection of short-window
//! probability collapses. A flash crash is an absolute drop of the
//! outcome probability by at least the threshold within the lookback
//! window, e.g. 0.5 down to 0.2 inside ten seconds.

mod tracker;
mod types;

pub use tracker::{CrashConfig, PriceTracker};
pub use types::{FlashCrashEvent, PricePoint};
