//! Selection of the capture entries that carry performance metrics.
//!
//! Captures hold every request a page made, most of them irrelevant. The
//! locator applies a list of tiers from strictest to loosest and returns
//! the matches of the first tier that finds anything.

use serde::{Deserialize, Serialize};

use crate::har::{Capture, Entry};

/// Substrings that only show up in metrics payloads.
pub const METRIC_MARKERS: [&str; 5] = [
    "RsOwnerMetrics",
    "metricType",
    "groupDimensionValue",
    "LISTING_IMPRESSION_COUNT",
    "EventResponses",
];

/// Settings for entry selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorConfig {
    /// Path fragment of the analytics endpoint
    #[serde(default = "default_api_path")]
    pub api_path: String,

    /// Key prefix of the metrics schema in response payloads
    #[serde(default = "default_payload_prefix")]
    pub payload_prefix: String,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            api_path: default_api_path(),
            payload_prefix: default_payload_prefix(),
        }
    }
}

fn default_api_path() -> String {
    "/data/graphql/ids".to_string()
}

fn default_payload_prefix() -> String {
    "RsOwnerMetrics".to_string()
}

/// How a tier constrains the request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UrlRule {
    ApiPath,
    Graphql,
    Any,
}

/// How a tier inspects the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyRule {
    AnyMarker,
    PayloadPrefix,
}

#[derive(Debug, Clone, Copy)]
struct Tier {
    name: &'static str,
    url: UrlRule,
    body: BodyRule,
}

const TIERS: [Tier; 3] = [
    Tier {
        name: "api-path",
        url: UrlRule::ApiPath,
        body: BodyRule::AnyMarker,
    },
    Tier {
        name: "graphql",
        url: UrlRule::Graphql,
        body: BodyRule::AnyMarker,
    },
    Tier {
        name: "payload-prefix",
        url: UrlRule::Any,
        body: BodyRule::PayloadPrefix,
    },
];

impl Tier {
    fn matches(&self, entry: &Entry, config: &LocatorConfig) -> bool {
        let url_ok = match self.url {
            UrlRule::ApiPath => entry.url().contains(&config.api_path),
            UrlRule::Graphql => entry.url().to_ascii_lowercase().contains("graphql"),
            UrlRule::Any => true,
        };
        if !url_ok || !entry.is_success() || !entry.is_json() {
            return false;
        }

        let body = entry.body_text();
        match self.body {
            BodyRule::AnyMarker => has_metric_marker(&body),
            BodyRule::PayloadPrefix => body.contains(&config.payload_prefix),
        }
    }
}

/// True when `text` mentions any of the [`METRIC_MARKERS`].
pub fn has_metric_marker(text: &str) -> bool {
    METRIC_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Return the entries of the first tier with at least one match.
///
/// An empty result means the capture has nothing to extract; it is not an
/// error.
pub fn locate<'a>(capture: &'a Capture, config: &LocatorConfig) -> Vec<&'a Entry> {
    for tier in &TIERS {
        let found: Vec<&Entry> = capture
            .entries()
            .iter()
            .filter(|entry| tier.matches(entry, config))
            .collect();
        log::debug!("Locator tier '{}' matched {} entries", tier.name, found.len());
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}
