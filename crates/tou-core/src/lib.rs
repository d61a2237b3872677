//! Core domain types for the ToU calculator.
//!
//! Readings and datum properties, the tariff schedule contract, fixed
//! charges, currency formatting, timezone helpers and CLI settings.

pub mod error;
pub mod fixed;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod tariff;
pub mod time_utils;
