use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TouError};

// ── Cell ──────────────────────────────────────────────────────────────────────

/// One value from a spreadsheet or CSV grid.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
    /// A native date/time value carried by the source (wall-clock, no zone).
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Build a text cell, mapping blank strings to [`Cell::Empty`].
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }

    /// Numeric value of the cell.
    ///
    /// Text cells count as numeric when their trimmed content parses as a
    /// finite float, since CSV sources deliver every field as text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if n.is_finite() => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Textual form of the cell, or `None` for an empty cell.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Bool(b) => Some(b.to_string()),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    Some(format!("{}", *n as i64))
                } else {
                    Some(n.to_string())
                }
            }
            Cell::Text(s) => Some(s.trim().to_string()),
            Cell::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text().unwrap_or_default())
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::text(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(value: NaiveDateTime) -> Self {
        Cell::DateTime(value)
    }
}

// ── DatumProperty ─────────────────────────────────────────────────────────────

/// Measured quantities a [`Reading`] can carry, in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatumProperty {
    /// Apparent energy, VAh.
    ApparentEnergy,
    /// Apparent power, VA.
    ApparentPower,
    /// Active energy, Wh.
    Energy,
    /// Active power, W.
    Power,
    /// Power factor, dimensionless.
    PowerFactor,
    /// Reactive energy, VARh.
    ReactiveEnergy,
    /// Reactive power, VAR.
    ReactivePower,
}

impl DatumProperty {
    /// Number of known properties.
    pub const COUNT: usize = 7;

    /// Every property, in column-classification priority order.
    pub const ALL: [DatumProperty; Self::COUNT] = [
        DatumProperty::ApparentEnergy,
        DatumProperty::ApparentPower,
        DatumProperty::Energy,
        DatumProperty::Power,
        DatumProperty::PowerFactor,
        DatumProperty::ReactiveEnergy,
        DatumProperty::ReactivePower,
    ];

    /// The canonical kebab-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DatumProperty::ApparentEnergy => "apparent-energy",
            DatumProperty::ApparentPower => "apparent-power",
            DatumProperty::Energy => "energy",
            DatumProperty::Power => "power",
            DatumProperty::PowerFactor => "power-factor",
            DatumProperty::ReactiveEnergy => "reactive-energy",
            DatumProperty::ReactivePower => "reactive-power",
        }
    }

    /// Whether the property is tracked as a running total.
    pub fn is_accumulating(&self) -> bool {
        matches!(
            self,
            DatumProperty::Energy | DatumProperty::ApparentEnergy | DatumProperty::ReactiveEnergy
        )
    }

    /// Stable slot position used for fixed-size per-property storage.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for DatumProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatumProperty {
    type Err = TouError;

    /// Case-insensitive; accepts kebab, snake and camel spellings plus the
    /// metering-API names `wattHours` and `watts`.
    fn from_str(value: &str) -> Result<Self> {
        let folded: String = value
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();
        match folded.as_str() {
            "watthours" => Ok(DatumProperty::Energy),
            "watts" => Ok(DatumProperty::Power),
            _ => DatumProperty::ALL
                .into_iter()
                .find(|p| p.as_str().replace('-', "") == folded)
                .ok_or_else(|| TouError::InvalidProperty(value.to_string())),
        }
    }
}

// ── Reading ───────────────────────────────────────────────────────────────────

/// Running-total values immediately before and after a reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accumulation {
    pub start: f64,
    pub end: f64,
}

/// One property value on a reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyValue {
    /// Instantaneous value, or the delta for an accumulating property.
    pub value: f64,
    /// Present only for accumulating properties.
    pub accumulation: Option<Accumulation>,
}

/// A normalised, timestamped measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Tz>,
    pub source_id: String,
    values: [Option<PropertyValue>; DatumProperty::COUNT],
}

impl Reading {
    pub fn new(timestamp: DateTime<Tz>, source_id: impl Into<String>) -> Self {
        Self {
            timestamp,
            source_id: source_id.into(),
            values: [None; DatumProperty::COUNT],
        }
    }

    /// Record an instantaneous value.
    pub fn set(&mut self, property: DatumProperty, value: f64) {
        self.values[property.index()] = Some(PropertyValue {
            value,
            accumulation: None,
        });
    }

    /// Record a delta together with the running totals around it.
    pub fn set_accumulated(&mut self, property: DatumProperty, value: f64, start: f64, end: f64) {
        self.values[property.index()] = Some(PropertyValue {
            value,
            accumulation: Some(Accumulation { start, end }),
        });
    }

    pub fn property(&self, property: DatumProperty) -> Option<&PropertyValue> {
        self.values[property.index()].as_ref()
    }

    pub fn value(&self, property: DatumProperty) -> Option<f64> {
        self.property(property).map(|p| p.value)
    }

    /// Running total before this reading (`<property>_start`).
    pub fn start(&self, property: DatumProperty) -> Option<f64> {
        self.property(property)
            .and_then(|p| p.accumulation)
            .map(|a| a.start)
    }

    /// Running total after this reading (`<property>_end`).
    pub fn end(&self, property: DatumProperty) -> Option<f64> {
        self.property(property)
            .and_then(|p| p.accumulation)
            .map(|a| a.end)
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Tz> {
        Tz::UTC.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    // ── Cell ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_cell_text_blank_is_empty() {
        assert_eq!(Cell::text("   "), Cell::Empty);
        assert_eq!(Cell::from(""), Cell::Empty);
    }

    #[test]
    fn test_cell_as_number_from_text() {
        assert_eq!(Cell::from(" 1.5 ").as_number(), Some(1.5));
        assert_eq!(Cell::from("N/A").as_number(), None);
        assert_eq!(Cell::Number(f64::NAN).as_number(), None);
        assert_eq!(Cell::Empty.as_number(), None);
    }

    #[test]
    fn test_cell_as_text_integral_number() {
        assert_eq!(Cell::Number(12.0).as_text().as_deref(), Some("12"));
        assert_eq!(Cell::Number(0.5).as_text().as_deref(), Some("0.5"));
        assert_eq!(Cell::Empty.as_text(), None);
    }

    // ── DatumProperty ─────────────────────────────────────────────────────────

    #[test]
    fn test_property_accumulating_flags() {
        let accumulating: Vec<_> = DatumProperty::ALL
            .iter()
            .filter(|p| p.is_accumulating())
            .collect();
        assert_eq!(
            accumulating,
            vec![
                &DatumProperty::ApparentEnergy,
                &DatumProperty::Energy,
                &DatumProperty::ReactiveEnergy
            ]
        );
    }

    #[test]
    fn test_property_from_str_aliases() {
        assert_eq!("energy".parse::<DatumProperty>().unwrap(), DatumProperty::Energy);
        assert_eq!("wattHours".parse::<DatumProperty>().unwrap(), DatumProperty::Energy);
        assert_eq!("watts".parse::<DatumProperty>().unwrap(), DatumProperty::Power);
        assert_eq!(
            "Reactive_Power".parse::<DatumProperty>().unwrap(),
            DatumProperty::ReactivePower
        );
        assert_eq!(
            "power-factor".parse::<DatumProperty>().unwrap(),
            DatumProperty::PowerFactor
        );
    }

    #[test]
    fn test_property_from_str_unknown() {
        let err = "voltage".parse::<DatumProperty>().unwrap_err();
        assert!(matches!(err, TouError::InvalidProperty(_)));
    }

    #[test]
    fn test_property_index_matches_priority_order() {
        for (i, p) in DatumProperty::ALL.iter().enumerate() {
            assert_eq!(p.index(), i);
        }
    }

    // ── Reading ───────────────────────────────────────────────────────────────

    #[test]
    fn test_reading_accumulated_values() {
        let mut r = Reading::new(ts(), "meter");
        r.set_accumulated(DatumProperty::Energy, 1000.0, 500.0, 1500.0);

        assert_eq!(r.value(DatumProperty::Energy), Some(1000.0));
        assert_eq!(r.start(DatumProperty::Energy), Some(500.0));
        assert_eq!(r.end(DatumProperty::Energy), Some(1500.0));
        assert_eq!(r.value(DatumProperty::Power), None);
    }

    #[test]
    fn test_reading_instantaneous_has_no_span() {
        let mut r = Reading::new(ts(), "meter");
        r.set(DatumProperty::Power, 2300.0);

        assert_eq!(r.value(DatumProperty::Power), Some(2300.0));
        assert_eq!(r.start(DatumProperty::Power), None);
        assert_eq!(r.end(DatumProperty::Power), None);
    }

    #[test]
    fn test_reading_is_empty_until_set() {
        let mut r = Reading::new(ts(), "");
        assert!(r.is_empty());
        r.set(DatumProperty::ReactivePower, 1.0);
        assert!(!r.is_empty());
        assert_eq!(r.value(DatumProperty::Energy), None);
    }
}
