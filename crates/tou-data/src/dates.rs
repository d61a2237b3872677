//! Date cell parsing shared by the decoder and the grid loaders.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use tou_core::models::Cell;
use tou_core::settings::DEFAULT_DATE_FORMATS;
use tou_core::time_utils::localize;
use tracing::trace;

/// Naive patterns tried before the configured fallbacks.
const NATIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%b %d %Y",
    "%d %b %Y",
];

/// Convert a spreadsheet serial day count into a wall-clock time.
///
/// Day 0 is 1899-12-30, which absorbs the phantom 1900-02-29 that
/// spreadsheets count, so serials from March 1900 onwards line up.
pub fn excel_serial_to_naive(days: f64) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (days * 86_400_000.0).round();
    if !millis.is_finite() || millis.abs() > 1e15 {
        return None;
    }
    epoch.checked_add_signed(Duration::milliseconds(millis as i64))
}

/// Turns grid cells into instants in a configured timezone.
#[derive(Debug, Clone)]
pub struct DateParser {
    tz: Tz,
    fallback_formats: Vec<String>,
}

impl Default for DateParser {
    fn default() -> Self {
        Self::new(
            Tz::UTC,
            DEFAULT_DATE_FORMATS.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl DateParser {
    pub fn new(tz: Tz, fallback_formats: Vec<String>) -> Self {
        Self {
            tz,
            fallback_formats,
        }
    }

    /// Parse a cell; `None` marks an invalid date.
    ///
    /// Native date cells are used as-is, numbers are spreadsheet serials, and
    /// text goes through the built-in formats and then each fallback pattern
    /// in order.
    pub fn parse(&self, cell: &Cell) -> Option<DateTime<Tz>> {
        match cell {
            Cell::DateTime(dt) => localize(dt, self.tz),
            Cell::Empty | Cell::Bool(_) => None,
            _ => {
                if let Some(days) = cell.as_number() {
                    return excel_serial_to_naive(days).and_then(|dt| localize(&dt, self.tz));
                }
                match cell {
                    Cell::Text(s) => self.parse_text(s.trim()),
                    _ => None,
                }
            }
        }
    }

    fn parse_text(&self, s: &str) -> Option<DateTime<Tz>> {
        if s.is_empty() {
            return None;
        }

        // Texts carrying their own offset are absolute instants.
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&self.tz));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
            return Some(dt.with_timezone(&self.tz));
        }

        let naive = NATIVE_FORMATS
            .iter()
            .copied()
            .chain(self.fallback_formats.iter().map(String::as_str))
            .find_map(|fmt| parse_naive(s, fmt));

        match naive {
            Some(dt) => localize(&dt, self.tz),
            None => {
                trace!("unparseable date text {:?}", s);
                None
            }
        }
    }
}

fn parse_naive(s: &str, fmt: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
        return Some(dt);
    }
    NaiveDate::parse_from_str(s, fmt)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
