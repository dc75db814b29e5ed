// src/ingest/providers/mod.rs
pub mod fixture;
pub mod scripted;
pub mod twitter;

use metrics::counter;
use serde::Deserialize;
use serde_json::Value;

use crate::error::FetchError;
use crate::ingest::types::Item;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    statuses: Option<Vec<Value>>,
}

/// Decode a search response body. Accepts `{"statuses": [...]}` or a bare array.
pub(crate) fn parse_search_body(body: &str) -> Result<Vec<Item>, FetchError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| FetchError::Fatal(format!("decoding search response: {e}")))?;
    let statuses = match value {
        Value::Array(records) => records,
        other => serde_json::from_value::<SearchResponse>(other)
            .map_err(|e| FetchError::Fatal(format!("unexpected search response shape: {e}")))?
            .statuses
            .unwrap_or_default(),
    };
    Ok(items_from_records(statuses))
}

/// Records without a usable `created_at` are dropped; they can never be
/// ordered against the watermark.
pub(crate) fn items_from_records(records: Vec<Value>) -> Vec<Item> {
    let mut out = Vec::with_capacity(records.len());
    for raw in records {
        match Item::from_json(raw) {
            Ok(item) => out.push(item),
            Err(e) => {
                tracing::warn!(error = %e, "dropping record without usable timestamp");
                counter!("poller_items_unparseable_total").increment(1);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_object_and_bare_array_both_decode() {
        let a = parse_search_body(r#"{"statuses":[{"created_at":1},{"created_at":2}]}"#).unwrap();
        let b = parse_search_body(r#"[{"created_at":1},{"created_at":2}]"#).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn missing_statuses_is_an_empty_batch() {
        assert!(parse_search_body(r#"{"search_metadata":{}}"#).unwrap().is_empty());
    }

    #[test]
    fn bad_records_are_skipped_not_fatal() {
        let out = parse_search_body(r#"[{"created_at":"nope"},{"created_at":7}]"#).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].created_at_ms(), 7);
    }

    #[test]
    fn invalid_json_is_fatal() {
        assert!(matches!(
            parse_search_body("<html>"),
            Err(FetchError::Fatal(_))
        ));
    }
}
