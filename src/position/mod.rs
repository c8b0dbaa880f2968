//! Position tracking module
//!
//! Single-position-per-side bookkeeping with fixed-delta take-profit and
//! stop-loss targets, plus aggregate trade statistics.

mod tracker;
mod types;

pub use tracker::{PositionConfig, PositionTracker, TrackerStats};
pub use types::{ExitReason, Position};
