//! Tabular source decoding.
//!
//! Infers the layout of a raw cell grid from its header row and turns the
//! data rows into a lazy stream of [`Reading`]s. Two layouts are understood:
//!
//! * **day rows**: one row per calendar day with one column per time of day
//!   (`0:00`, `6:30`, `12:00PM`, ...), each cell a kWh delta;
//! * **property columns**: one row per timestamp with one column per
//!   measured property (`Energy (kWh)`, `Power Factor`, ...).

use std::iter::FusedIterator;
use std::slice;

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use regex::Regex;
use tou_core::error::{Result, TouError};
use tou_core::models::{Cell, DatumProperty, Reading};
use tou_core::settings::DEFAULT_DATE_FORMATS;
use tracing::{debug, warn};

use crate::dates::DateParser;

/// Source values are kilo-units; readings carry base units.
const KILO: f64 = 1000.0;

// ── Options ───────────────────────────────────────────────────────────────────

/// Knobs for one decode pass.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Zone that naive date/time cells are read in.
    pub timezone: Tz,
    /// Stream identifier stamped on every reading.
    pub source_id: String,
    /// Patterns tried, in order, after the built-in date formats.
    pub fallback_date_formats: Vec<String>,
    /// Running total each accumulating property starts from.
    pub baselines: [f64; DatumProperty::COUNT],
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            source_id: "file".to_string(),
            fallback_date_formats: DEFAULT_DATE_FORMATS.iter().map(|s| s.to_string()).collect(),
            baselines: [0.0; DatumProperty::COUNT],
        }
    }
}

impl DecodeOptions {
    pub fn new(timezone: Tz, source_id: impl Into<String>) -> Self {
        Self {
            timezone,
            source_id: source_id.into(),
            ..Self::default()
        }
    }

    pub fn with_fallback_formats(mut self, formats: Vec<String>) -> Self {
        self.fallback_date_formats = formats;
        self
    }

    pub fn with_baseline(mut self, property: DatumProperty, total: f64) -> Self {
        self.baselines[property.index()] = total;
        self
    }
}

// ── Layout detection ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    DayRows,
    PropertyColumns,
    Undetected,
}

/// A header cell holding a time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeColumn {
    pub index: usize,
    pub minute_of_day: u32,
}

/// A header cell naming a measured property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyColumn {
    pub index: usize,
    pub property: DatumProperty,
}

fn header_text(header: &[Cell]) -> Vec<String> {
    header
        .iter()
        .map(|c| c.as_text().unwrap_or_default())
        .collect()
}

/// Index of the first header cell mentioning "date".
pub fn find_date_column(header: &[Cell]) -> Option<usize> {
    let date_re = Regex::new(r"(?i)date").expect("regex is valid");
    header_text(header)
        .iter()
        .position(|text| date_re.is_match(text))
}

/// Matches `H`, `H:MM` or `H:MM[AM|PM]` header cells.
pub fn time_header_regex() -> Regex {
    Regex::new(r"(?i)^(\d{1,2})(?::(\d{2})(AM?|PM?)?)?$").expect("regex is valid")
}

/// Decode a time-of-day header into a minute-of-day offset.
///
/// A trailing `P` adds twelve hours; `A` adjusts nothing. Hours are not
/// range checked, so `"25"` yields 1500.
pub fn parse_time_header(time_re: &Regex, text: &str) -> Option<u32> {
    let caps = time_re.captures(text.trim())?;
    let hours: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
    let pm = caps
        .get(3)
        .is_some_and(|m| m.as_str().starts_with(['P', 'p']));
    Some(hours * 60 + minutes + if pm { 720 } else { 0 })
}

/// Every header cell (other than the date column) holding a time of day.
pub fn extract_time_columns(header: &[Cell], date_col: usize) -> Vec<TimeColumn> {
    let time_re = time_header_regex();
    header_text(header)
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != date_col)
        .filter_map(|(index, text)| {
            parse_time_header(&time_re, text).map(|minute_of_day| TimeColumn {
                index,
                minute_of_day,
            })
        })
        .collect()
}

struct ColumnPattern {
    property: DatumProperty,
    include: Regex,
    exclude: Option<Regex>,
}

impl ColumnPattern {
    fn new(property: DatumProperty, include: &str, exclude: Option<&str>) -> Self {
        Self {
            property,
            include: Regex::new(&format!("(?i){}", include)).expect("regex is valid"),
            exclude: exclude.map(|e| Regex::new(&format!("(?i){}", e)).expect("regex is valid")),
        }
    }

    fn matches(&self, text: &str) -> bool {
        self.include.is_match(text) && !self.exclude.as_ref().is_some_and(|e| e.is_match(text))
    }
}

/// Header patterns in priority order.
///
/// Plain energy and power must not swallow their apparent or reactive
/// variants, whether named in words or only by unit (kVAh, kVArh).
fn column_patterns() -> Vec<ColumnPattern> {
    vec![
        ColumnPattern::new(
            DatumProperty::ApparentEnergy,
            r"\bapparent\b.*\benergy\b|\bk?vah\b",
            None,
        ),
        ColumnPattern::new(
            DatumProperty::ApparentPower,
            r"\bapparent\b.*\bpower\b|\bk?va\b",
            None,
        ),
        ColumnPattern::new(
            DatumProperty::Energy,
            r"\benergy\b|\bk?wh\b",
            Some(r"\b(apparent|reactive|k?varh?|k?vah?)\b"),
        ),
        ColumnPattern::new(
            DatumProperty::Power,
            r"\bpower\b|\bk?w\b",
            Some(r"\b(apparent|reactive|factor|k?varh?|k?vah?)\b"),
        ),
        ColumnPattern::new(DatumProperty::PowerFactor, r"\bpower[\s_-]*factor\b|\bpf\b", None),
        ColumnPattern::new(
            DatumProperty::ReactiveEnergy,
            r"\breactive\b.*\benergy\b|\bk?varh\b",
            None,
        ),
        ColumnPattern::new(
            DatumProperty::ReactivePower,
            r"\breactive\b.*\bpower\b|\bk?var\b",
            None,
        ),
    ]
}

/// Assign properties to header cells.
///
/// The first pattern matching a column wins, and each property is taken by
/// the first column that claims it.
pub fn classify_property_columns(header: &[Cell], date_col: usize) -> Vec<PropertyColumn> {
    let patterns = column_patterns();
    let mut taken = [false; DatumProperty::COUNT];
    let mut columns = Vec::new();

    for (index, text) in header_text(header).iter().enumerate() {
        if index == date_col || text.is_empty() {
            continue;
        }
        let Some(pattern) = patterns.iter().find(|p| p.matches(text)) else {
            continue;
        };
        let slot = &mut taken[pattern.property.index()];
        if *slot {
            debug!(
                column = index,
                property = %pattern.property,
                "ignoring duplicate property column"
            );
            continue;
        }
        *slot = true;
        columns.push(PropertyColumn {
            index,
            property: pattern.property,
        });
    }
    columns
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decode `grid` (row 0 is the header) into a lazy reading stream.
///
/// Fails only when the header has no date column. An empty grid or an
/// unrecognised layout yields an empty stream.
pub fn decode<'a>(grid: &'a [Vec<Cell>], options: &DecodeOptions) -> Result<ReadingStream<'a>> {
    let context = RowContext {
        date_col: 0,
        dates: DateParser::new(options.timezone, options.fallback_date_formats.clone()),
        source_id: options.source_id.clone(),
    };

    let Some((header, rows)) = grid.split_first() else {
        debug!("empty grid, nothing to decode");
        return Ok(ReadingStream::new(rows_of(&[]), context, LayoutDecoder::Undetected));
    };

    let date_col = find_date_column(header).ok_or_else(|| TouError::DateColumnNotFound {
        header: header_text(header).join(","),
    })?;
    let context = RowContext { date_col, ..context };

    let time_columns = extract_time_columns(header, date_col);
    let decoder = if !time_columns.is_empty() {
        debug!(
            date_col,
            columns = time_columns.len(),
            "decoding day rows layout"
        );
        LayoutDecoder::DayRows(DayRowsDecoder {
            columns: time_columns,
            current: None,
            next_col: 0,
            total: options.baselines[DatumProperty::Energy.index()],
        })
    } else {
        let property_columns = classify_property_columns(header, date_col);
        if property_columns.is_empty() {
            warn!("no time-of-day or property columns in header, nothing to decode");
            LayoutDecoder::Undetected
        } else {
            debug!(
                date_col,
                properties = ?property_columns.iter().map(|c| c.property).collect::<Vec<_>>(),
                "decoding property columns layout"
            );
            LayoutDecoder::PropertyColumns(PropertyColumnsDecoder {
                columns: property_columns,
                totals: options.baselines,
            })
        }
    };

    Ok(ReadingStream::new(rows_of(rows), context, decoder))
}

fn rows_of(rows: &[Vec<Cell>]) -> slice::Iter<'_, Vec<Cell>> {
    rows.iter()
}

struct RowContext {
    date_col: usize,
    dates: DateParser,
    source_id: String,
}

impl RowContext {
    fn row_date(&self, row: &[Cell]) -> Option<DateTime<Tz>> {
        let date = self.dates.parse(row.get(self.date_col).unwrap_or(&Cell::Empty));
        if date.is_none() {
            debug!(
                value = %row.get(self.date_col).unwrap_or(&Cell::Empty),
                "skipping row with invalid date"
            );
        }
        date
    }
}

enum LayoutDecoder<'a> {
    DayRows(DayRowsDecoder<'a>),
    PropertyColumns(PropertyColumnsDecoder),
    Undetected,
}

struct DayRowsDecoder<'a> {
    columns: Vec<TimeColumn>,
    current: Option<(&'a [Cell], DateTime<Tz>)>,
    next_col: usize,
    total: f64,
}

impl<'a> DayRowsDecoder<'a> {
    fn next(
        &mut self,
        rows: &mut slice::Iter<'a, Vec<Cell>>,
        context: &RowContext,
    ) -> Option<Reading> {
        loop {
            if let Some((row, date)) = self.current {
                while let Some(column) = self.columns.get(self.next_col) {
                    self.next_col += 1;
                    let Some(kwh) = row.get(column.index).and_then(Cell::as_number) else {
                        continue;
                    };
                    let delta = kwh * KILO;
                    let start = self.total;
                    self.total += delta;

                    let timestamp = date + Duration::minutes(i64::from(column.minute_of_day));
                    let mut reading = Reading::new(timestamp, context.source_id.clone());
                    reading.set_accumulated(DatumProperty::Energy, delta, start, self.total);
                    return Some(reading);
                }
                self.current = None;
            }

            let row = rows.next()?;
            if let Some(date) = context.row_date(row) {
                self.current = Some((row.as_slice(), date));
                self.next_col = 0;
            }
        }
    }
}

struct PropertyColumnsDecoder {
    columns: Vec<PropertyColumn>,
    totals: [f64; DatumProperty::COUNT],
}

impl PropertyColumnsDecoder {
    fn next(&mut self, rows: &mut slice::Iter<'_, Vec<Cell>>, context: &RowContext) -> Option<Reading> {
        loop {
            let row = rows.next()?;
            let Some(timestamp) = context.row_date(row) else {
                continue;
            };

            let mut reading = Reading::new(timestamp, context.source_id.clone());
            for column in &self.columns {
                let Some(raw) = row.get(column.index).and_then(Cell::as_number) else {
                    continue;
                };
                let value = raw * KILO;
                let property = column.property;
                if property.is_accumulating() {
                    let total = &mut self.totals[property.index()];
                    let start = *total;
                    *total += value;
                    reading.set_accumulated(property, value, start, *total);
                } else {
                    reading.set(property, value);
                }
            }

            if reading.is_empty() {
                debug!(at = %timestamp, "skipping row without numeric values");
                continue;
            }
            return Some(reading);
        }
    }
}

/// Single-pass, pull-driven stream of decoded readings.
pub struct ReadingStream<'a> {
    rows: slice::Iter<'a, Vec<Cell>>,
    context: RowContext,
    decoder: LayoutDecoder<'a>,
}

impl<'a> ReadingStream<'a> {
    fn new(rows: slice::Iter<'a, Vec<Cell>>, context: RowContext, decoder: LayoutDecoder<'a>) -> Self {
        Self {
            rows,
            context,
            decoder,
        }
    }

    pub fn layout(&self) -> Layout {
        match self.decoder {
            LayoutDecoder::DayRows(_) => Layout::DayRows,
            LayoutDecoder::PropertyColumns(_) => Layout::PropertyColumns,
            LayoutDecoder::Undetected => Layout::Undetected,
        }
    }
}

impl Iterator for ReadingStream<'_> {
    type Item = Reading;

    fn next(&mut self) -> Option<Reading> {
        match &mut self.decoder {
            LayoutDecoder::DayRows(d) => d.next(&mut self.rows, &self.context),
            LayoutDecoder::PropertyColumns(d) => d.next(&mut self.rows, &self.context),
            LayoutDecoder::Undetected => None,
        }
    }
}

impl FusedIterator for ReadingStream<'_> {}

// ── Tests ─────────────────────────────────────────────────────────────────────
