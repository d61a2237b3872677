//! Data layer for the ToU calculator.
//!
//! Loads usage grids and tariff schedules from disk, decodes grids into
//! reading streams and prices those streams against a flat rate and a
//! tariff schedule.

pub mod aggregator;
pub mod dates;
pub mod decoder;
pub mod reader;
pub mod schedule_csv;

pub use tou_core as core;
