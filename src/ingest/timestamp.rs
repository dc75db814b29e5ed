// src/ingest/timestamp.rs
use chrono::DateTime;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

/// Classic search API format, e.g. `Wed Aug 27 13:08:45 +0000 2008`.
const TWITTER_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Parse a `created_at` value into milliseconds since the epoch.
///
/// Tries the classic search format, then RFC 3339 (v2 API), then RFC 2822.
pub fn parse_created_at(ts: &str) -> Option<i64> {
    let ts = ts.trim();
    if let Ok(dt) = DateTime::parse_from_str(ts, TWITTER_FORMAT) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.timestamp_millis());
    }
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .and_then(|dt| i64::try_from(dt.unix_timestamp_nanos() / 1_000_000).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_format() {
        assert_eq!(
            parse_created_at("Wed Aug 27 13:08:45 +0000 2008"),
            Some(1_219_842_525_000)
        );
    }

    #[test]
    fn offsets_are_normalised_to_utc() {
        assert_eq!(
            parse_created_at("Wed Aug 27 15:08:45 +0200 2008"),
            parse_created_at("Wed Aug 27 13:08:45 +0000 2008")
        );
    }

    #[test]
    fn rfc3339_keeps_millis() {
        assert_eq!(
            parse_created_at("2008-08-27T13:08:45.123Z"),
            Some(1_219_842_525_123)
        );
    }

    #[test]
    fn rfc2822() {
        assert_eq!(
            parse_created_at("Wed, 27 Aug 2008 13:08:45 +0000"),
            Some(1_219_842_525_000)
        );
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_created_at(""), None);
        assert_eq!(parse_created_at("not a date"), None);
    }
}
