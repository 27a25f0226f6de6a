use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Anything that can plausibly represent a timestamp coming out of a
/// bookmaker payload: Unix seconds, Unix milliseconds, or an ISO-ish
/// string. Unrecognizable input fails soft (returns `None`) rather than
/// erroring rather than failing the whole match.
pub enum RawTimestamp<'a> {
    UnixSeconds(i64),
    UnixMillis(i64),
    Text(&'a str),
}

const ISO_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse a timestamp from any of the shapes bookmaker APIs tend to use.
/// Always returns a UTC instant, or `None` if nothing matched.
pub fn parse_timestamp(raw: RawTimestamp) -> Option<DateTime<Utc>> {
    match raw {
        RawTimestamp::UnixSeconds(s) => Utc.timestamp_opt(s, 0).single(),
        RawTimestamp::UnixMillis(ms) => Utc.timestamp_millis_opt(ms).single(),
        RawTimestamp::Text(s) => {
            let trimmed = s.trim().trim_end_matches('Z');

            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }

            for fmt in ISO_FORMATS {
                if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }

            None
        }
    }
}

/// Convenience for the common case: a numeric epoch value of unknown
/// granularity (seconds vs. milliseconds), auto-detected the way the
/// source scrapers do (`timestamp > 1e12` => milliseconds).
pub fn parse_epoch(value: f64) -> Option<DateTime<Utc>> {
    if value > 1e12 {
        parse_timestamp(RawTimestamp::UnixMillis(value as i64))
    } else {
        parse_timestamp(RawTimestamp::UnixSeconds(value as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_seconds() {
        let ts = parse_timestamp(RawTimestamp::UnixSeconds(1_735_689_600)).unwrap();
        assert_eq!(ts.timestamp(), 1_735_689_600);
    }

    #[test]
    fn parses_unix_millis_via_epoch_heuristic() {
        let ts = parse_epoch(1_735_689_600_000.0).unwrap();
        assert_eq!(ts.timestamp(), 1_735_689_600);
    }

    #[test]
    fn parses_iso_with_zulu() {
        let ts = parse_timestamp(RawTimestamp::Text("2025-03-01T20:00:00Z")).unwrap();
        assert_eq!(ts.timestamp(), 1_740_852_000);
    }

    #[test]
    fn fails_soft_on_garbage() {
        assert!(parse_timestamp(RawTimestamp::Text("not a date")).is_none());
    }
}
