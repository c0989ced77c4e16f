//! Timestamp resolution across the date dialects seen in RSS/Atom and article metadata.
//!
//! Accepted inputs, in order of attempts:
//! 1. RFC 3339 / ISO-8601 with `Z` or a numeric offset.
//! 2. Free-form dates ending in a named abbreviation (`GMT`, `EST`, `MSK`, ...),
//!    resolved against a fixed abbreviation → IANA zone table. Unknown
//!    abbreviations resolve as UTC.
//! 3. RFC 2822 and other numeric-offset layouts.
//! 4. Naive date/time layouts, interpreted as UTC.
//!
//! Anything else yields `None`: a missing timestamp stays missing and is never
//! replaced by "now".

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
    "%d %B %Y %H:%M:%S",
    "%d %B %Y %H:%M",
    "%b %d %Y %H:%M:%S",
    "%b %d, %Y %H:%M:%S",
    "%b %d, %Y %H:%M",
    "%B %d %Y %H:%M:%S",
    "%B %d, %Y %H:%M:%S",
    "%B %d, %Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d %b %Y", "%d %B %Y", "%B %d, %Y", "%d.%m.%Y"];

/// Fixed abbreviation table. Zones (not fixed offsets) so `EST` in July lands on EDT,
/// the same way a zone-aware date parser resolves it.
pub fn zone_for_abbreviation(abbr: &str) -> Option<Tz> {
    match abbr.to_ascii_uppercase().as_str() {
        "UTC" | "GMT" | "UT" | "Z" => Some(chrono_tz::UTC),
        "EST" | "EDT" => Some(chrono_tz::America::New_York),
        "CST" | "CDT" => Some(chrono_tz::America::Chicago),
        "PST" | "PDT" => Some(chrono_tz::America::Los_Angeles),
        "BST" => Some(chrono_tz::Europe::London),
        "CET" | "CEST" => Some(chrono_tz::Europe::Paris),
        "MSK" => Some(chrono_tz::Europe::Moscow),
        _ => None,
    }
}

/// Resolve a raw timestamp string to an absolute UTC instant.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Some(dt) = parse_with_abbreviation(s) {
        return Some(dt);
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let body = strip_weekday(s);
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::<FixedOffset>::parse_from_str(body, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    parse_naive(body).map(|n| Utc.from_utc_datetime(&n))
}

/// `"Tue, 02 Jan 2024 10:00:00 EST"` → split off the trailing alphabetic token and
/// localize the rest in the matching zone.
fn parse_with_abbreviation(s: &str) -> Option<DateTime<Utc>> {
    let (rest, last) = s.rsplit_once(char::is_whitespace)?;
    let token = last.trim_matches(|c| c == '(' || c == ')');
    if token.is_empty() || token.len() > 5 || !token.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let naive = parse_naive(strip_weekday(rest.trim()))?;
    let zone = zone_for_abbreviation(token).unwrap_or(chrono_tz::UTC);
    let local = zone.from_local_datetime(&naive);
    let resolved = local
        .earliest()
        .or_else(|| local.latest())
        .map(|dt| dt.with_timezone(&Utc))
        // Non-existent local time (DST gap): treat the wall clock as UTC.
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive));
    Some(resolved)
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(n) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(n);
        }
    }
    for fmt in NAIVE_DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Drop a leading `"Mon, "` so inconsistent weekdays do not fail the whole parse.
fn strip_weekday(s: &str) -> &str {
    match s.split_once(',') {
        Some((head, tail)) if !head.is_empty() && head.chars().all(|c| c.is_ascii_alphabetic()) => {
            tail.trim_start()
        }
        _ => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, s).unwrap()
    }

    #[test]
    fn iso_with_and_without_z() {
        assert_eq!(
            parse_timestamp("2024-03-10T12:00:00Z"),
            Some(utc(2024, 3, 10, 12, 0, 0))
        );
        assert_eq!(
            parse_timestamp("2024-03-10T12:00:00"),
            Some(utc(2024, 3, 10, 12, 0, 0))
        );
        assert_eq!(
            parse_timestamp("2024-03-10T15:00:00+03:00"),
            Some(utc(2024, 3, 10, 12, 0, 0))
        );
    }

    #[test]
    fn rfc2822_numeric_offset() {
        assert_eq!(
            parse_timestamp("Sun, 10 Mar 2024 15:00:00 +0300"),
            Some(utc(2024, 3, 10, 12, 0, 0))
        );
    }

    #[test]
    fn named_abbreviations_resolve_through_zone_table() {
        // GMT
        assert_eq!(
            parse_timestamp("Wed, 10 Jan 2024 12:00:00 GMT"),
            Some(utc(2024, 1, 10, 12, 0, 0))
        );
        // EST in winter: UTC-5
        assert_eq!(
            parse_timestamp("Wed, 10 Jan 2024 07:00:00 EST"),
            Some(utc(2024, 1, 10, 12, 0, 0))
        );
        // MSK: UTC+3
        assert_eq!(
            parse_timestamp("10 Jan 2024 15:00:00 MSK"),
            Some(utc(2024, 1, 10, 12, 0, 0))
        );
        // CEST in summer: UTC+2
        assert_eq!(
            parse_timestamp("Mon, 15 Jul 2024 14:00:00 CEST"),
            Some(utc(2024, 7, 15, 12, 0, 0))
        );
    }

    #[test]
    fn unknown_abbreviation_falls_back_to_utc() {
        assert_eq!(
            parse_timestamp("Wed, 10 Jan 2024 12:00:00 XYZ"),
            Some(utc(2024, 1, 10, 12, 0, 0))
        );
    }

    #[test]
    fn wrong_weekday_is_tolerated() {
        // 10 Jan 2024 was a Wednesday.
        assert_eq!(
            parse_timestamp("Fri, 10 Jan 2024 12:00:00 GMT"),
            Some(utc(2024, 1, 10, 12, 0, 0))
        );
    }

    #[test]
    fn absent_or_garbage_is_none() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("   "), None);
        assert_eq!(parse_timestamp("yesterday-ish"), None);
    }

    #[test]
    fn date_only_is_midnight_utc() {
        assert_eq!(parse_timestamp("2024-03-10"), Some(utc(2024, 3, 10, 0, 0, 0)));
    }
}
