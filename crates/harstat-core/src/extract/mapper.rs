//! Deterministic extraction from known analytics payload shapes.
//!
//! The analytics API answers in a handful of related layouts:
//!
//! - a GraphQL batch: `[{"data": {"RsOwnerMetrics_...": <groups>}}]`
//! - an object with a `timeSeries` or `EventResponses` array of groups
//! - a bare array of groups
//!
//! A group is any object carrying a date under `groupDimensionValue` or
//! `Date`; only non-empty strings count as dates. Its metrics come from a `metrics` list of
//! `{"metricType", "metricValue"}` pairs, from a nested `Metrics` object, or
//! from the group itself, checked in that order per metric.

use serde_json::{Map as JsonMap, Value as JsonValue, json};

use super::RawRecord;
use crate::metrics::{DATE_COLUMN, Metric};

/// Keys that hold the date of a metric group.
pub const DATE_KEYS: [&str; 2] = ["groupDimensionValue", "Date"];

const CONTAINER_KEYS: [&str; 3] = ["data", "timeSeries", "EventResponses"];

const MAX_DEPTH: usize = 32;

/// Map every metric group found in `text` to a record.
///
/// Text that is not JSON yields no records.
pub fn map_payload(text: &str, prefix: &str) -> Vec<RawRecord> {
    let value: JsonValue = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            log::debug!("Payload is not JSON, nothing to map: {}", e);
            return Vec::new();
        }
    };
    let mut records = Vec::new();
    collect(&value, prefix, 0, &mut records);
    records
}

fn collect(value: &JsonValue, prefix: &str, depth: usize, out: &mut Vec<RawRecord>) {
    if depth > MAX_DEPTH {
        return;
    }
    match value {
        JsonValue::Array(items) => {
            for item in items {
                collect(item, prefix, depth + 1, out);
            }
        }
        JsonValue::Object(map) => {
            if DATE_KEYS.iter().any(|key| map.contains_key(*key)) {
                match read_date(map) {
                    Some(date) => out.push(RawRecord::Mapped(map_group(map, date))),
                    None => log::debug!("Skipping metric group without a readable date"),
                }
                return;
            }
            for (key, child) in map {
                if CONTAINER_KEYS.contains(&key.as_str()) || key.starts_with(prefix) {
                    collect(child, prefix, depth + 1, out);
                }
            }
        }
        _ => {}
    }
}

fn read_date(group: &JsonMap<String, JsonValue>) -> Option<String> {
    DATE_KEYS.iter().find_map(|key| match group.get(*key)? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

fn map_group(group: &JsonMap<String, JsonValue>, date: String) -> JsonMap<String, JsonValue> {
    let pairs = metric_pairs(group);
    let nested = group
        .get("Metrics")
        .or_else(|| group.get("metrics"))
        .and_then(JsonValue::as_object);

    let mut record = JsonMap::new();
    record.insert(DATE_COLUMN.to_string(), JsonValue::String(date));
    for metric in Metric::ALL {
        let key = metric.technical_key();
        let value = pairs
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, v)| (*v).clone())
            .or_else(|| nested.and_then(|n| n.get(key)).cloned())
            .or_else(|| group.get(key).cloned())
            .unwrap_or_else(|| json!(0));
        record.insert(metric.column().to_string(), value);
    }
    record
}

/// Entries of a `metrics: [{"metricType": .., "metricValue": ..}]` list.
fn metric_pairs(group: &JsonMap<String, JsonValue>) -> Vec<(Metric, &JsonValue)> {
    let Some(items) = group.get("metrics").and_then(JsonValue::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let metric = Metric::from_technical_key(item.get("metricType")?.as_str()?)?;
            let value = item.get("metricValue").or_else(|| item.get("value"))?;
            Some((metric, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "RsOwnerMetrics";

    fn only(records: &[RawRecord]) -> &JsonMap<String, JsonValue> {
        assert_eq!(records.len(), 1, "expected one record, got {:?}", records);
        records[0].fields()
    }

    #[test]
    fn test_graphql_batch_with_metric_list() {
        let body = r#"[{"data":{"RsOwnerMetrics_x":{"groupDimensionValue":"2024-01-01","metrics":[{"metricType":"RANKING","metricValue":12},{"metricType":"UNKNOWN","metricValue":3}]}}}]"#;
        let records = map_payload(body, PREFIX);
        let record = only(&records);
        assert_eq!(record["Date"], json!("2024-01-01"));
        assert_eq!(record["Average ranking"], json!(12));
        assert_eq!(record["Listing impressions"], json!(0));
        assert_eq!(record.len(), 10);
        assert!(matches!(records[0], RawRecord::Mapped(_)));
    }

    #[test]
    fn test_time_series_with_nested_metrics() {
        let body = r#"{"timeSeries":[
            {"groupDimensionValue":"2024-02-01","Metrics":{"BUBBLE_RATING":4.5,"REVIEW_COUNT":2}},
            {"groupDimensionValue":"2024-02-02","Metrics":{"BUBBLE_RATING":4.0}}
        ]}"#;
        let records = map_payload(body, PREFIX);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields()["Average bubble rating"], json!(4.5));
        assert_eq!(records[0].fields()["New reviews"], json!(2));
        assert_eq!(records[1].fields()["New reviews"], json!(0));
    }

    #[test]
    fn test_event_responses_flat_records() {
        let body = r#"{"EventResponses":[
            {"Date":"2024-03-05","LISTING_IMPRESSION_COUNT":120,"HOTEL_SEARCH_LEAD_TIME_AVERAGE":131.5},
            {"Date":null,"LISTING_IMPRESSION_COUNT":1}
        ]}"#;
        let records = map_payload(body, PREFIX);
        let record = only(&records);
        assert_eq!(record["Date"], json!("2024-03-05"));
        assert_eq!(record["Listing impressions"], json!(120));
        assert_eq!(record["Average booking lead time"], json!(131.5));
    }

    #[test]
    fn test_numeric_date_is_not_a_date() {
        let body = r#"[{"Date":20240101,"RANKING":3},{"groupDimensionValue":"20240102","RANKING":4}]"#;
        let records = map_payload(body, PREFIX);
        let record = only(&records);
        assert_eq!(record["Date"], json!("20240102"));
        assert_eq!(record["Average ranking"], json!(4));
    }

    #[test]
    fn test_bare_array_of_groups() {
        let body = r#"[{"Date":"2024-01-02","RANKING":3},{"groupDimensionValue":"2024-01-01","RANKING":4}]"#;
        let records = map_payload(body, PREFIX);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].fields()["Date"], json!("2024-01-01"));
    }

    #[test]
    fn test_ignores_unrelated_keys_and_bad_text() {
        let body = r#"[{"data":{"viewer":{"Date":"2024-01-01","RANKING":1}}}]"#;
        assert!(map_payload(body, PREFIX).is_empty());
        assert!(map_payload("<html></html>", PREFIX).is_empty());
        assert!(map_payload("", PREFIX).is_empty());
    }
}
