//! Tariff schedule loading from CSV.
//!
//! The first row is a header. Rule rows list their range columns followed by
//! one column per rate, the rate id being that column's header:
//!
//! ```text
//! Month,Day,Weekday,Hour,Energy
//! Jan-Dec,,Mon-Fri,0-8,10.48
//! ```
//!
//! A header with more than five columns whose first cell mentions "year"
//! switches to year mode, where a leading year column is added and rules are
//! mutually exclusive.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tou_core::error::{Result, TouError};
use tou_core::tariff::{
    MatchMode, TariffRate, TariffSchedule, TemporalRangesSchedule, TemporalRangesTariff,
};
use tracing::{debug, info};

/// Minimum number of columns a rule row must have to be considered.
const MIN_RULE_COLUMNS: usize = 5;

/// Load a tariff schedule from a CSV file.
pub fn load_schedule(path: &Path) -> Result<TemporalRangesSchedule> {
    let file = File::open(path).map_err(|source| TouError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let schedule = parse_schedule(file)?;
    info!(
        "Loaded {} tariff rules from {}",
        schedule.rules().len(),
        path.display()
    );
    Ok(schedule)
}

/// Parse tariff CSV content into a schedule.
pub fn parse_schedule<R: Read>(source: R) -> Result<TemporalRangesSchedule> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let mut header: Vec<String> = Vec::new();
    let mut year_mode = false;
    let mut rules = Vec::new();

    for (line, record) in reader.records().enumerate() {
        let record = record?;
        if header.is_empty() {
            header = record.iter().map(str::to_string).collect();
            year_mode = header.len() > MIN_RULE_COLUMNS
                && header[0].to_lowercase().contains("year");
            debug!(year_mode, columns = header.len(), "tariff header");
            continue;
        }
        if record.len() < MIN_RULE_COLUMNS {
            debug!(line = line + 1, "skipping short tariff row");
            continue;
        }

        let row: Vec<&str> = record.iter().collect();
        let rate_start = if year_mode { 5 } else { 4 };
        let mut rates = Vec::new();
        for (id, text) in header.iter().zip(&row).skip(rate_start) {
            if text.is_empty() {
                continue;
            }
            rates.push(TariffRate::parse(id, text)?);
        }

        let rule = if year_mode {
            TemporalRangesTariff::parse_years(row[0], row[1], row[2], row[3], row[4], rates)
        } else {
            TemporalRangesTariff::parse(row[0], row[1], row[2], row[3], rates)
        }
        .map_err(|e| match e {
            TouError::ScheduleParse(msg) => {
                TouError::ScheduleParse(format!("row {}: {}", line + 1, msg))
            }
            other => other,
        })?;
        rules.push(rule);
    }

    if rules.is_empty() {
        return Err(TouError::ScheduleParse("no rules available".to_string()));
    }

    Ok(if year_mode {
        TemporalRangesSchedule::new(rules, MatchMode::FirstMatch).with_year_extend(true)
    } else {
        TemporalRangesSchedule::new(rules, MatchMode::MultipleMatch)
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::io::Write;
    use tempfile::TempDir;
    use tou_core::tariff::TariffRule;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    // ── plain mode ────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_plain_schedule_is_multiple_match() {
        let csv = "Month,Day,Weekday,Hour,Energy,Demand\n\
                   Jan-Dec,,Mon-Fri,0-8,10.48,1.5\n\
                   Jan-Dec,,,*,2.0\n";
        let schedule = parse_schedule(csv.as_bytes()).unwrap();
        assert_eq!(schedule.mode(), MatchMode::MultipleMatch);
        assert_eq!(schedule.rules().len(), 2);

        let first = &schedule.rules()[0];
        assert_eq!(first.rates().len(), 2);
        assert_eq!(first.rates()[0], TariffRate::new("Energy", 1048, -2));
        assert_eq!(first.rates()[1].id, "Demand");
        assert_eq!(schedule.rules()[1].rates().len(), 1);

        // 2024-01-01 was a Monday: both rules apply at 03:00.
        assert_eq!(schedule.matches(&at(2024, 1, 1, 3)), vec![0, 1]);
        assert_eq!(schedule.matches(&at(2024, 1, 1, 12)), vec![1]);
    }

    #[test]
    fn test_parse_skips_short_rows() {
        let csv = "Month,Day,Weekday,Hour,Energy\nJan,1\nJan-Dec,,,,0.2\n";
        let schedule = parse_schedule(csv.as_bytes()).unwrap();
        assert_eq!(schedule.rules().len(), 1);
    }

    #[test]
    fn test_parse_bad_range_reports_row() {
        let csv = "Month,Day,Weekday,Hour,Energy\nSmarch,,,,0.2\n";
        match parse_schedule(csv.as_bytes()) {
            Err(TouError::ScheduleParse(msg)) => assert!(msg.starts_with("row 2")),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_parse_bad_rate_is_rate_error() {
        let csv = "Month,Day,Weekday,Hour,Energy\nJan,,,,cheap\n";
        assert!(matches!(
            parse_schedule(csv.as_bytes()),
            Err(TouError::InvalidRate(_))
        ));
    }

    #[test]
    fn test_parse_header_only_is_error() {
        let csv = "Month,Day,Weekday,Hour,Energy\n";
        assert!(matches!(
            parse_schedule(csv.as_bytes()),
            Err(TouError::ScheduleParse(_))
        ));
    }

    // ── year mode ─────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_year_schedule_is_first_match_with_extend() {
        let csv = "Year,Month,Day,Weekday,Hour,Energy\n\
                   2022,,,,,0.10\n\
                   2023,,,,,0.12\n\
                   2023,,,,,0.99\n";
        let schedule = parse_schedule(csv.as_bytes()).unwrap();
        assert_eq!(schedule.mode(), MatchMode::FirstMatch);
        assert_eq!(schedule.matches(&at(2022, 6, 1, 0)), vec![0]);
        assert_eq!(schedule.matches(&at(2023, 6, 1, 0)), vec![1]);
        // 2025 is past every rule, so the 2023 rules carry forward.
        assert_eq!(schedule.matches(&at(2025, 6, 1, 0)), vec![1]);
    }

    #[test]
    fn test_year_header_needs_extra_column() {
        // Five columns only: "Year" is read as the month column.
        let csv = "Year,Day,Weekday,Hour,Energy\nJan,,,,0.1\n";
        let schedule = parse_schedule(csv.as_bytes()).unwrap();
        assert_eq!(schedule.mode(), MatchMode::MultipleMatch);
    }

    // ── load_schedule ─────────────────────────────────────────────────────────

    #[test]
    fn test_load_schedule_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tariff.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "Month,Day,Weekday,Hour,Energy").unwrap();
        writeln!(file, "Jan-Dec,,,0-8,0.15").unwrap();
        drop(file);

        let schedule = load_schedule(&path).unwrap();
        assert_eq!(schedule.rules().len(), 1);
    }

    #[test]
    fn test_load_schedule_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_schedule(&dir.path().join("nope.csv")),
            Err(TouError::FileRead { .. })
        ));
    }
}
