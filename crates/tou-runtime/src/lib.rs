//! Runtime layer for the ToU calculator.
//!
//! Sources usage and tariff files off the async executor, runs the
//! decode + aggregate pass and keeps the last good result.

pub mod session;

pub use tou_core as core;
pub use tou_data as data;
