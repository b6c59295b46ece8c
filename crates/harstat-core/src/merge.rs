//! Reduction of raw extracted records into the canonical [`Table`].

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::extract::RawRecord;
use crate::metrics::{DATE_COLUMN, LABEL_COLUMN, Metric, MetricRecord, Table};

/// Label used when neither the caller nor the record supplies one.
pub const FALLBACK_LABEL: &str = "Unknown";

const DATE_ALIASES: [&str; 4] = [DATE_COLUMN, "date", "일자", "groupDimensionValue"];
const LABEL_ALIASES: [&str; 3] = [LABEL_COLUMN, "label", "지점명"];

static THOUSANDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?\d{1,3}(,\d{3})+(\.\d+)?$").expect("valid thousands pattern")
});

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];
const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Merge per-chunk record lists into one table.
///
/// Records with an unparseable date are dropped, missing metrics become 0,
/// and of several records sharing a (date, label) pair only the first one
/// encountered is kept. Rows come out in ascending date order.
pub fn merge<I>(batches: I, label: &str) -> Table
where
    I: IntoIterator<Item = Vec<RawRecord>>,
{
    let label = label.trim();
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    let mut dropped = 0usize;
    let mut duplicates = 0usize;

    for record in batches.into_iter().flatten() {
        let Some(row) = to_metric_record(record.fields(), label) else {
            dropped += 1;
            continue;
        };
        if seen.insert((row.date, row.label.clone())) {
            rows.push(row);
        } else {
            duplicates += 1;
        }
    }

    rows.sort_by_key(|row| row.date);
    log::debug!(
        "Merged {} rows ({} without a valid date, {} duplicates)",
        rows.len(),
        dropped,
        duplicates
    );
    Table::from_sorted(rows)
}

fn to_metric_record(fields: &JsonMap<String, JsonValue>, label: &str) -> Option<MetricRecord> {
    let date = DATE_ALIASES
        .iter()
        .find_map(|key| fields.get(*key).and_then(parse_date))?;

    let record_label = LABEL_ALIASES
        .iter()
        .find_map(|key| fields.get(*key)?.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let label = match record_label {
        Some(existing) => existing,
        None if !label.is_empty() => label,
        None => FALLBACK_LABEL,
    };

    let mut row = MetricRecord::new(date, label);
    for metric in Metric::ALL {
        row.set(metric, coerce_number(metric_value(fields, metric)));
    }
    Some(row)
}

fn metric_value(fields: &JsonMap<String, JsonValue>, metric: Metric) -> Option<&JsonValue> {
    fields
        .get(metric.column())
        .or_else(|| fields.get(metric.technical_key()))
        .or_else(|| {
            let wanted = loose_key(metric.column());
            fields
                .iter()
                .find(|(key, _)| loose_key(key) == wanted)
                .map(|(_, value)| value)
        })
}

/// Lowercase alphanumerics only, so `listing_impressions` finds
/// `Listing impressions`.
fn loose_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Parse a calendar date from the common textual layouts.
pub fn parse_date(value: &JsonValue) -> Option<NaiveDate> {
    let text = value.as_str()?.trim();
    if text.is_empty() {
        return None;
    }
    if text.len() == 8 && text.bytes().all(|b| b.is_ascii_digit()) {
        let year = text[0..4].parse().ok()?;
        let month = text[4..6].parse().ok()?;
        let day = text[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.date_naive());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|datetime| datetime.date())
}

/// Numeric value of a metric field; anything unusable is 0.
fn coerce_number(value: Option<&JsonValue>) -> f64 {
    let number = match value {
        Some(JsonValue::Number(n)) => n.as_f64(),
        Some(JsonValue::String(s)) => parse_number_text(s),
        Some(JsonValue::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    number.filter(|n| n.is_finite()).unwrap_or(0.0)
}

/// `1,234` is a thousands separator, `4,5` a decimal comma. Anything else
/// with commas in it is rejected.
fn parse_number_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .trim_end_matches('%')
        .trim()
        .chars()
        .filter(|c| *c != '_')
        .collect();
    let cleaned = if !cleaned.contains(',') {
        cleaned
    } else if THOUSANDS.is_match(&cleaned) {
        cleaned.replace(',', "")
    } else if cleaned.matches(',').count() == 1 && !cleaned.contains('.') {
        cleaned.replace(',', ".")
    } else {
        return None;
    };
    cleaned.parse::<f64>().ok()
}
