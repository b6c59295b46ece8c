//! Decoding and compaction of located response bodies.
//!
//! Compaction drops everything in a GraphQL batch response that is not part
//! of the metrics schema, which keeps oracle prompts small. It is strictly
//! best effort: any text that does not have the expected shape passes
//! through unchanged.

use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::har::Entry;

/// Decoded and compacted body text of `entry`.
pub fn normalize(entry: &Entry, prefix: &str) -> String {
    compact(&entry.body_text(), prefix)
}

/// Keep only `data` sub-keys starting with `prefix` in a list of
/// `{"data": {...}}` objects. Other input is returned as is.
pub fn compact(text: &str, prefix: &str) -> String {
    let Ok(JsonValue::Array(items)) = serde_json::from_str::<JsonValue>(text) else {
        return text.to_string();
    };

    let mut compacted = Vec::with_capacity(items.len());
    for item in &items {
        let Some(data) = item.get("data").and_then(JsonValue::as_object) else {
            return text.to_string();
        };
        let kept: JsonMap<String, JsonValue> = data
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let mut object = JsonMap::new();
        object.insert("data".to_string(), JsonValue::Object(kept));
        compacted.push(JsonValue::Object(object));
    }

    match serde_json::to_string(&compacted) {
        Ok(out) => out,
        Err(e) => {
            log::warn!("Failed to serialize compacted payload: {}", e);
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::har::entry;

    const PREFIX: &str = "RsOwnerMetrics";

    #[test]
    fn test_compact_drops_foreign_keys() {
        let raw = r#"[
            {"data": {"RsOwnerMetrics_a": {"groupDimensionValue": "2024-01-01"}, "viewer": {"id": 7}}},
            {"data": {"navigation": []}}
        ]"#;
        let out = compact(raw, PREFIX);
        assert_eq!(
            out,
            r#"[{"data":{"RsOwnerMetrics_a":{"groupDimensionValue":"2024-01-01"}}},{"data":{}}]"#
        );
    }

    #[test]
    fn test_compact_passes_other_shapes_through() {
        for raw in [
            r#"{"data": {"RsOwnerMetrics_a": 1}}"#,
            r#"[{"data": [1, 2]}]"#,
            r#"[{"nodata": {}}]"#,
            r#"[1, 2, 3]"#,
            "not json at all",
            "",
        ] {
            assert_eq!(compact(raw, PREFIX), raw);
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            r#"[{"data":{"RsOwnerMetrics_a":{"x":1},"other":2}}]"#,
            r#"[{"data":{"RsOwnerMetrics_a":{"x":1}}}]"#,
            r#"{"EventResponses":[]}"#,
            "plain text",
        ];
        for sample in samples {
            let e = entry("u", 200, "application/json", sample);
            let once = normalize(&e, PREFIX);
            let again = normalize(&entry("u", 200, "application/json", &once), PREFIX);
            assert_eq!(once, again);
        }
    }
}
