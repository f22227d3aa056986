//! Lenient timestamp parsing and date-range filtering.
//!
//! Stored records carry timestamps in three shapes: ISO 8601 with a `T`,
//! SQLite's `YYYY-MM-DD HH:MM:SS`, and a bare `YYYY-MM-DD`. Sorting must never
//! fail on a malformed value, so anything unparseable collapses to the Unix
//! epoch. That fallback is logged so corrupt rows can be traced.
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use log::{debug, warn};

use crate::{Result, UtmError};

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// The value every unparseable timestamp resolves to
pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Parses a stored timestamp, falling back to the epoch.
///
/// Timestamps without an offset are read as UTC.
pub fn parse_date(input: Option<&str>) -> DateTime<Utc> {
    let raw = match input.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => {
            debug!("Empty timestamp, using epoch");
            return epoch();
        }
    };

    match try_parse(raw) {
        Some(parsed) => parsed,
        None => {
            warn!("Invalid date '{}', falling back to epoch", raw);
            epoch()
        }
    }
}

fn try_parse(raw: &str) -> Option<DateTime<Utc>> {
    if raw.contains('T') {
        parse_iso(raw)
    } else if raw.contains(' ') {
        parse_iso(&raw.replacen(' ', "T", 1))
    } else {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
    }
}

fn parse_iso(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Inclusive calendar-day range used by the history date filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// A range exists only when both bounds are present.
    pub fn from_bounds(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<DateRange> {
        match (start, end) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            _ => None,
        }
    }

    /// Parses `YYYY-MM-DD_YYYY-MM-DD`, the format the date picker produces.
    pub fn parse(text: &str) -> Result<DateRange> {
        let (start, end) = text.trim().split_once('_').ok_or_else(|| {
            UtmError::validation(format!(
                "Date range '{}' must look like 2024-01-01_2024-01-31",
                text
            ))
        })?;
        let day = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| UtmError::validation(format!("Invalid date: {}", s)))
        };
        Ok(DateRange {
            start: day(start)?,
            end: day(end)?,
        })
    }

    /// Start of the first day and the last millisecond of the last day
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.start.and_time(NaiveTime::MIN);
        let end = self
            .end
            .and_hms_milli_opt(23, 59, 59, 999)
            .unwrap_or_else(|| self.end.and_time(NaiveTime::MIN));
        (Utc.from_utc_datetime(&start), Utc.from_utc_datetime(&end))
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        let (start, end) = self.bounds();
        instant >= start && instant <= end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_garbage_resolve_to_epoch() {
        assert_eq!(parse_date(Some("")), epoch());
        assert_eq!(parse_date(None), epoch());
        assert_eq!(parse_date(Some("not-a-date")), epoch());
        assert_eq!(parse_date(Some("2024-13-45")), epoch());
        assert_eq!(epoch().timestamp(), 0);
    }

    #[test]
    fn three_shapes_of_the_same_instant_agree() {
        let midnight = parse_date(Some("2024-01-05"));
        assert_eq!(midnight, parse_date(Some("2024-01-05 00:00:00")));
        assert_eq!(midnight, parse_date(Some("2024-01-05T00:00:00")));

        let ten = parse_date(Some("2024-01-05T10:00:00"));
        assert_eq!(ten, parse_date(Some("2024-01-05 10:00:00")));
        assert_eq!(ten - midnight, chrono::Duration::hours(10));
    }

    #[test]
    fn accepts_offsets_and_fractions() {
        let a = parse_date(Some("2024-01-05T10:00:00+03:00"));
        let b = parse_date(Some("2024-01-05 07:00:00.123456"));
        assert_eq!(a.timestamp(), b.timestamp());
        assert_eq!(parse_date(Some("2024-01-05T10:00:00Z")).timestamp(), 1704448800);
    }

    #[test]
    fn range_is_inclusive_to_end_of_day() {
        let range = DateRange::parse("2024-01-01_2024-01-31").unwrap();
        assert!(range.contains(parse_date(Some("2024-01-01"))));
        assert!(range.contains(parse_date(Some("2024-01-31 23:59:59"))));
        assert!(!range.contains(parse_date(Some("2024-02-01"))));
        assert!(!range.contains(parse_date(Some("2023-12-31 23:59:59"))));
    }

    #[test]
    fn range_requires_both_bounds() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1);
        assert!(DateRange::from_bounds(day, None).is_none());
        assert!(DateRange::from_bounds(day, day).is_some());
        assert!(DateRange::parse("2024-01-01").is_err());
    }
}
