//! Tariff schedule contract and a temporal-range implementation of it.
//!
//! The cost aggregator only sees [`TariffSchedule`] and [`TariffRule`]; the
//! [`TemporalRangesSchedule`] here is the schedule the CLI builds from a
//! tariff CSV.

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::error::{Result, TouError};

// ── TariffRate ────────────────────────────────────────────────────────────────

/// A named rate expressed as `amount × 10^exponent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TariffRate {
    pub id: String,
    pub amount: i64,
    pub exponent: i32,
}

impl TariffRate {
    pub fn new(id: impl Into<String>, amount: i64, exponent: i32) -> Self {
        Self {
            id: id.into(),
            amount,
            exponent,
        }
    }

    /// Parse a decimal string such as `"0.153"` into amount 153, exponent -3.
    ///
    /// Thousands separators are ignored.
    pub fn parse(id: &str, text: &str) -> Result<Self> {
        let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
        let (negative, digits) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));

        let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
            return Err(TouError::InvalidRate(format!("{}: {:?}", id, text)));
        }

        let mantissa = format!("{}{}", whole, frac);
        let amount: i64 = mantissa
            .parse()
            .map_err(|_| TouError::InvalidRate(format!("{}: {:?}", id, text)))?;
        let exponent = -(frac.len() as i32);

        Ok(Self::new(
            id.trim(),
            if negative { -amount } else { amount },
            exponent,
        ))
    }

    /// The rate as a float.
    pub fn value(&self) -> f64 {
        if self.exponent < 0 {
            self.amount as f64 / 10_f64.powi(-self.exponent)
        } else {
            self.amount as f64 * 10_f64.powi(self.exponent)
        }
    }
}

// ── Contract ──────────────────────────────────────────────────────────────────

/// A rule that carries one or more named rates.
pub trait TariffRule {
    fn rates(&self) -> &[TariffRate];
}

/// An ordered set of rules plus the policy for matching them.
///
/// Rule identity is positional: `matches` returns indices into `rules()`.
pub trait TariffSchedule {
    type Rule: TariffRule;

    fn rules(&self) -> &[Self::Rule];

    /// Indices of the rules that apply at the given wall-clock time, in
    /// schedule order. At most one index under first-match semantics.
    fn matches(&self, at: &NaiveDateTime) -> Vec<usize>;

    /// The first rule that applies, regardless of matching mode.
    fn first_match(&self, at: &NaiveDateTime) -> Option<usize>;
}

// ── Ranges ────────────────────────────────────────────────────────────────────

/// Inclusive integer range; wraps around when `min > max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntRange {
    pub min: i32,
    pub max: i32,
}

impl IntRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: i32) -> bool {
        if self.min <= self.max {
            value >= self.min && value <= self.max
        } else {
            value >= self.min || value <= self.max
        }
    }
}

/// Minute-of-day range with an exclusive end; wraps past midnight when
/// `start > end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinuteRange {
    pub start: u32,
    pub end: u32,
}

impl MinuteRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, minute: u32) -> bool {
        if self.start <= self.end {
            minute >= self.start && minute < self.end
        } else {
            minute >= self.start || minute < self.end
        }
    }
}

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const WEEKDAY_NAMES: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

fn is_unrestricted(text: &str) -> bool {
    let t = text.trim();
    t.is_empty() || t == "*" || t.eq_ignore_ascii_case("all")
}

fn split_range(text: &str) -> (&str, Option<&str>) {
    match text.split_once('-') {
        Some((l, r)) => (l.trim(), Some(r.trim())),
        None => (text.trim(), None),
    }
}

fn parse_int_range(
    field: &str,
    text: &str,
    bounds: (i32, i32),
    parse_value: impl Fn(&str) -> Option<i32>,
) -> Result<Option<IntRange>> {
    if is_unrestricted(text) {
        return Ok(None);
    }
    let bad = || TouError::ScheduleParse(format!("bad {} range: {}", field, text.trim()));
    let (lo, hi) = split_range(text);
    let min = parse_value(lo).ok_or_else(bad)?;
    let max = match hi {
        Some(hi) => parse_value(hi).ok_or_else(bad)?,
        None => min,
    };
    if min < bounds.0 || min > bounds.1 || max < bounds.0 || max > bounds.1 {
        return Err(bad());
    }
    Ok(Some(IntRange::new(min, max)))
}

fn name_or_number(names: &[&str], s: &str) -> Option<i32> {
    if let Ok(n) = s.parse::<i32>() {
        return Some(n);
    }
    let lower = s.to_lowercase();
    let prefix = lower.get(..3)?;
    names.iter().position(|n| *n == prefix).map(|i| i as i32 + 1)
}

/// Parse `H`, `HH` or `HH:MM` into minutes of the day.
fn parse_hour_minutes(s: &str) -> Option<u32> {
    let (h, m) = s.split_once(':').unwrap_or((s, "0"));
    let h: u32 = h.trim().parse().ok()?;
    let m: u32 = m.trim().parse().ok()?;
    if m >= 60 {
        return None;
    }
    Some(h * 60 + m)
}

fn parse_minute_range(text: &str) -> Result<Option<MinuteRange>> {
    if is_unrestricted(text) {
        return Ok(None);
    }
    let bad = || TouError::ScheduleParse(format!("bad hour range: {}", text.trim()));
    let (lo, hi) = split_range(text);
    let start = parse_hour_minutes(lo).ok_or_else(bad)?;
    let end = match hi {
        Some(hi) => parse_hour_minutes(hi).ok_or_else(bad)?,
        // a lone hour covers that whole hour
        None => start + 60,
    };
    if start > 1440 || end > 1440 {
        return Err(bad());
    }
    Ok(Some(MinuteRange::new(start, end)))
}

// ── TemporalRangesTariff ──────────────────────────────────────────────────────

/// A rule that applies when every configured range contains the time.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalRangesTariff {
    pub year: Option<IntRange>,
    pub month: Option<IntRange>,
    pub day_of_month: Option<IntRange>,
    /// Monday = 1 through Sunday = 7.
    pub day_of_week: Option<IntRange>,
    pub minute_of_day: Option<MinuteRange>,
    pub rates: Vec<TariffRate>,
}

impl TemporalRangesTariff {
    /// Parse a rule from its textual range columns.
    pub fn parse(
        months: &str,
        days: &str,
        weekdays: &str,
        hours: &str,
        rates: Vec<TariffRate>,
    ) -> Result<Self> {
        Ok(Self {
            year: None,
            month: parse_int_range("month", months, (1, 12), |s| {
                name_or_number(&MONTH_NAMES, s)
            })?,
            day_of_month: parse_int_range("day", days, (1, 31), |s| s.parse().ok())?,
            day_of_week: parse_int_range("weekday", weekdays, (1, 7), |s| {
                name_or_number(&WEEKDAY_NAMES, s)
            })?,
            minute_of_day: parse_minute_range(hours)?,
            rates,
        })
    }

    /// Parse a rule that also restricts the year.
    pub fn parse_years(
        years: &str,
        months: &str,
        days: &str,
        weekdays: &str,
        hours: &str,
        rates: Vec<TariffRate>,
    ) -> Result<Self> {
        let mut rule = Self::parse(months, days, weekdays, hours, rates)?;
        rule.year = parse_int_range("year", years, (1, 9999), |s| s.parse().ok())?;
        Ok(rule)
    }

    /// Whether the rule applies at `at`, evaluating the year range against
    /// `year` rather than the timestamp's own year.
    pub fn applies_at(&self, at: &NaiveDateTime, year: i32) -> bool {
        let minute = at.hour() * 60 + at.minute();
        self.year.map_or(true, |r| r.contains(year))
            && self.month.map_or(true, |r| r.contains(at.month() as i32))
            && self.day_of_month.map_or(true, |r| r.contains(at.day() as i32))
            && self
                .day_of_week
                .map_or(true, |r| r.contains(at.weekday().number_from_monday() as i32))
            && self.minute_of_day.map_or(true, |r| r.contains(minute))
    }
}

impl TariffRule for TemporalRangesTariff {
    fn rates(&self) -> &[TariffRate] {
        &self.rates
    }
}

// ── TemporalRangesSchedule ────────────────────────────────────────────────────

/// How many rules may apply to one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Rules are mutually exclusive; the first applicable rule wins.
    FirstMatch,
    /// Every applicable rule applies.
    MultipleMatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemporalRangesSchedule {
    rules: Vec<TemporalRangesTariff>,
    mode: MatchMode,
    year_extend: bool,
}

impl TemporalRangesSchedule {
    pub fn new(rules: Vec<TemporalRangesTariff>, mode: MatchMode) -> Self {
        Self {
            rules,
            mode,
            year_extend: false,
        }
    }

    /// When enabled, a year not covered by any rule falls back to the latest
    /// earlier year that is covered.
    pub fn with_year_extend(mut self, year_extend: bool) -> Self {
        self.year_extend = year_extend;
        self
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    fn effective_year(&self, year: i32) -> i32 {
        if !self.year_extend {
            return year;
        }
        let year_ranges = || self.rules.iter().filter_map(|r| r.year);
        if year_ranges().any(|r| r.contains(year)) {
            return year;
        }
        year_ranges()
            .filter(|r| r.min <= r.max && r.max < year)
            .map(|r| r.max)
            .max()
            .unwrap_or(year)
    }
}

impl TariffSchedule for TemporalRangesSchedule {
    type Rule = TemporalRangesTariff;

    fn rules(&self) -> &[TemporalRangesTariff] {
        &self.rules
    }

    fn matches(&self, at: &NaiveDateTime) -> Vec<usize> {
        let year = self.effective_year(at.year());
        let applicable = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, r)| r.applies_at(at, year))
            .map(|(i, _)| i);
        match self.mode {
            MatchMode::FirstMatch => applicable.take(1).collect(),
            MatchMode::MultipleMatch => applicable.collect(),
        }
    }

    fn first_match(&self, at: &NaiveDateTime) -> Option<usize> {
        let year = self.effective_year(at.year());
        self.rules.iter().position(|r| r.applies_at(at, year))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
