use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use tracing::warn;

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Resolve a timezone name into a [`Tz`].
///
/// `"auto"` means the system timezone. Unrecognised names fall back to UTC
/// with a warning.
pub fn resolve_timezone(tz_name: &str) -> Tz {
    let name = if tz_name.eq_ignore_ascii_case("auto") {
        get_system_timezone()
    } else {
        tz_name.to_string()
    };
    name.parse::<Tz>().unwrap_or_else(|_| {
        warn!("unrecognised timezone \"{}\", falling back to UTC", name);
        Tz::UTC
    })
}

/// Place a wall-clock time in `tz`.
///
/// Ambiguous times (DST fall-back) take the earlier instant; times that do
/// not exist (DST spring-forward gap) yield `None`.
pub fn localize(naive: &NaiveDateTime, tz: Tz) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(naive).earliest()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_get_system_timezone_non_empty() {
        assert!(!get_system_timezone().is_empty());
    }

    #[test]
    fn test_resolve_timezone_named() {
        assert_eq!(resolve_timezone("Pacific/Auckland"), chrono_tz::Pacific::Auckland);
    }

    #[test]
    fn test_resolve_timezone_invalid_falls_back_to_utc() {
        assert_eq!(resolve_timezone("Mars/Olympus_Mons"), Tz::UTC);
    }

    #[test]
    fn test_localize_plain_time() {
        let dt = localize(&naive(2024, 6, 1, 12, 0), Tz::UTC).unwrap();
        assert_eq!(dt.hour(), 12);
    }

    #[test]
    fn test_localize_dst_gap_is_none() {
        // Clocks in New York jumped from 02:00 to 03:00 on 2024-03-10.
        let tz = chrono_tz::America::New_York;
        assert!(localize(&naive(2024, 3, 10, 2, 30), tz).is_none());
    }

    #[test]
    fn test_localize_dst_overlap_takes_earlier() {
        // 01:30 happened twice in New York on 2024-11-03.
        let tz = chrono_tz::America::New_York;
        let dt = localize(&naive(2024, 11, 3, 1, 30), tz).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-11-03T01:30:00-04:00");
    }
}
