//! Instruction text sent to the completion service.

use std::fmt::Write as _;

use crate::metrics::{DATE_COLUMN, LABEL_COLUMN, Metric};

/// Build the extraction instruction for one chunk of payload text.
///
/// The instruction carries the technical key to column mapping, asks for
/// `label` on every record, fixes the null handling and key spelling, and
/// ends with the chunk itself.
pub fn extraction_prompt(label: &str, chunk: &str) -> String {
    let mut prompt = String::with_capacity(chunk.len() + 2_048);

    prompt.push_str(
        "You extract hotel performance data from recorded analytics API responses.\n\
         Map the technical field names in the data below to the output keys listed here \
         and answer with a JSON array containing one object per calendar day.\n\n",
    );

    prompt.push_str("### 1. Field mapping\n");
    let _ = writeln!(
        prompt,
        "- 'groupDimensionValue' or 'Date' (as YYYY-MM-DD) -> \"{}\"",
        DATE_COLUMN
    );
    for metric in Metric::ALL {
        let _ = writeln!(prompt, "- '{}' -> \"{}\"", metric.technical_key(), metric.column());
    }

    prompt.push_str("\n### 2. Rules\n");
    let _ = writeln!(
        prompt,
        "1. Add the key \"{}\" with the value {} to every object.",
        LABEL_COLUMN,
        serde_json::Value::String(label.to_string())
    );
    prompt.push_str(
        "2. Any numeric value that is missing, null, NaN or empty must be written as the number 0.\n\
         3. Use the output keys exactly as written above, including case and spaces. \
         Never rename them, for example to snake_case.\n\
         4. Answer with the JSON array only, without explanations.\n",
    );

    prompt.push_str("\n### 3. Output keys\n");
    let _ = writeln!(prompt, "- {}", DATE_COLUMN);
    let _ = writeln!(prompt, "- {}", LABEL_COLUMN);
    for metric in Metric::ALL {
        let _ = writeln!(prompt, "- {}", metric.column());
    }

    prompt.push_str("\n### Example answer\n");
    prompt.push_str(&example_answer(label));

    prompt.push_str("\n\n### Data\n");
    prompt.push_str(chunk);
    prompt.push('\n');
    prompt
}

fn example_answer(label: &str) -> String {
    let sample = [120.0, 5.0, 4.5, 10.0, 2.0, 1.0, 0.0, 2.0, 15.0];
    let mut object = serde_json::Map::new();
    object.insert(DATE_COLUMN.into(), "2024-01-01".into());
    object.insert(LABEL_COLUMN.into(), label.into());
    for (metric, value) in Metric::ALL.iter().zip(sample) {
        object.insert(metric.column().into(), value.into());
    }
    serde_json::to_string_pretty(&[serde_json::Value::Object(object)]).unwrap_or_default()
}
