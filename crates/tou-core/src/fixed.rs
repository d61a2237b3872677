//! Fixed (time-based) charges such as daily connection fees.

use std::fmt;
use std::str::FromStr;

use chrono::{Months, NaiveDateTime};

use crate::error::{Result, TouError};

/// The calendar unit a fixed charge is billed per.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChronoUnit {
    Day,
    Week,
    Month,
}

impl ChronoUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChronoUnit::Day => "day",
            ChronoUnit::Week => "week",
            ChronoUnit::Month => "month",
        }
    }
}

impl FromStr for ChronoUnit {
    type Err = TouError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "day" | "days" | "d" => Ok(ChronoUnit::Day),
            "week" | "weeks" | "w" => Ok(ChronoUnit::Week),
            "month" | "months" | "m" => Ok(ChronoUnit::Month),
            other => Err(TouError::InvalidFixedCharge(format!(
                "unknown unit: {}",
                other
            ))),
        }
    }
}

/// A charge billed per elapsed [`ChronoUnit`], independent of usage.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedCharge {
    pub name: Option<String>,
    pub unit: ChronoUnit,
    /// Rate per unit, in currency subdivisions when `rate_divisor` is 100.
    pub rate: f64,
    pub rate_divisor: f64,
}

impl FixedCharge {
    pub fn new(name: Option<String>, unit: ChronoUnit, rate: f64, rate_divisor: f64) -> Self {
        Self {
            name,
            unit,
            rate,
            rate_divisor,
        }
    }

    /// Number of (possibly fractional) units elapsed between `from` and `to`.
    pub fn quantity(&self, from: NaiveDateTime, to: NaiveDateTime) -> f64 {
        if to <= from {
            return 0.0;
        }
        let days = (to - from).num_milliseconds() as f64 / 86_400_000.0;
        match self.unit {
            ChronoUnit::Day => days,
            ChronoUnit::Week => days / 7.0,
            ChronoUnit::Month => months_between(from, to),
        }
    }

    /// Cost of this charge over `[from, to)`.
    pub fn cost(&self, from: NaiveDateTime, to: NaiveDateTime) -> f64 {
        self.quantity(from, to) * (self.rate / self.rate_divisor)
    }
}

/// Whole calendar months stepped from `from`, plus the elapsed fraction of
/// the month that follows.
fn months_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    let mut whole = 0u32;
    let mut cursor = from;
    loop {
        let Some(next) = from.checked_add_months(Months::new(whole + 1)) else {
            break;
        };
        if next > to {
            let span = (next - cursor).num_milliseconds() as f64;
            let part = (to - cursor).num_milliseconds() as f64;
            return whole as f64 + if span > 0.0 { part / span } else { 0.0 };
        }
        whole += 1;
        cursor = next;
    }
    whole as f64
}

impl FromStr for FixedCharge {
    type Err = TouError;

    /// Parse `[NAME:]RATE[c]/UNIT`, e.g. `Connection:1.20/day` or `45c/week`.
    /// A `c` suffix on the rate means the rate is in cents (divisor 100).
    fn from_str(value: &str) -> Result<Self> {
        let bad = || TouError::InvalidFixedCharge(value.to_string());
        let (name, rest) = match value.rsplit_once(':') {
            Some((n, r)) if !n.trim().is_empty() => (Some(n.trim().to_string()), r),
            Some((_, r)) => (None, r),
            None => (None, value),
        };
        let (rate_text, unit_text) = rest.split_once('/').ok_or_else(bad)?;
        let rate_text = rate_text.trim();
        let (rate_text, rate_divisor) = match rate_text.strip_suffix(['c', 'C']) {
            Some(r) => (r, 100.0),
            None => (rate_text.strip_prefix('$').unwrap_or(rate_text), 1.0),
        };
        let rate: f64 = rate_text.trim().parse().map_err(|_| bad())?;
        if !rate.is_finite() {
            return Err(bad());
        }
        Ok(Self::new(name, unit_text.parse()?, rate, rate_divisor))
    }
}

impl fmt::Display for FixedCharge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{}: ", name)?;
        }
        if self.rate_divisor == 100.0 {
            write!(f, "{}c/{}", self.rate, self.unit.as_str())
        } else {
            write!(f, "${}/{}", self.rate, self.unit.as_str())
        }
    }
}

/// A fixed charge prorated over a calculation period.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedCost {
    pub name: String,
    pub quantity: f64,
    pub cost: f64,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    // ── parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_named_dollar_rate() {
        let fc: FixedCharge = "Connection:1.20/day".parse().unwrap();
        assert_eq!(fc.name.as_deref(), Some("Connection"));
        assert_eq!(fc.unit, ChronoUnit::Day);
        assert!((fc.rate - 1.2).abs() < 1e-12);
        assert_eq!(fc.rate_divisor, 1.0);
    }

    #[test]
    fn test_parse_cents_without_name() {
        let fc: FixedCharge = "45c/week".parse().unwrap();
        assert!(fc.name.is_none());
        assert_eq!(fc.unit, ChronoUnit::Week);
        assert_eq!(fc.rate, 45.0);
        assert_eq!(fc.rate_divisor, 100.0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("1.20".parse::<FixedCharge>().is_err());
        assert!("abc/day".parse::<FixedCharge>().is_err());
        assert!("1/fortnight".parse::<FixedCharge>().is_err());
    }

    #[test]
    fn test_display_round_trip_shape() {
        let fc: FixedCharge = "Meter:30c/month".parse().unwrap();
        assert_eq!(fc.to_string(), "Meter: 30c/month");
    }

    // ── quantity ──────────────────────────────────────────────────────────────

    #[test]
    fn test_quantity_days_fractional() {
        let fc = FixedCharge::new(None, ChronoUnit::Day, 1.0, 1.0);
        let q = fc.quantity(dt(2024, 1, 1, 0), dt(2024, 1, 3, 12));
        assert!((q - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_quantity_weeks() {
        let fc = FixedCharge::new(None, ChronoUnit::Week, 1.0, 1.0);
        let q = fc.quantity(dt(2024, 1, 1, 0), dt(2024, 1, 15, 0));
        assert!((q - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_quantity_months_whole_and_partial() {
        let fc = FixedCharge::new(None, ChronoUnit::Month, 1.0, 1.0);
        assert!((fc.quantity(dt(2024, 1, 1, 0), dt(2024, 3, 1, 0)) - 2.0).abs() < 1e-9);

        // Half of April (30 days) after one whole month.
        let q = fc.quantity(dt(2024, 3, 1, 0), dt(2024, 4, 16, 0));
        assert!((q - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_quantity_reversed_range_is_zero() {
        let fc = FixedCharge::new(None, ChronoUnit::Day, 1.0, 1.0);
        assert_eq!(fc.quantity(dt(2024, 1, 2, 0), dt(2024, 1, 1, 0)), 0.0);
    }

    #[test]
    fn test_cost_applies_divisor() {
        let fc: FixedCharge = "150c/day".parse().unwrap();
        let cost = fc.cost(dt(2024, 1, 1, 0), dt(2024, 1, 11, 0));
        assert!((cost - 15.0).abs() < 1e-9);
    }
}
