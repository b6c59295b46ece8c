//! Oracle-assisted extraction through a text completion service.
//!
//! The service is reached through the [`Oracle`] trait so that the retry and
//! credential handling can be driven by scripted implementations in tests.
//! [`GeminiOracle`] is the production implementation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue, json};
use url::Url;

use super::RawRecord;
use super::prompt::extraction_prompt;
use crate::Error;

/// Attempts per chunk before it is given up.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// A text completion service.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Complete `prompt` authenticating with `credential`.
    async fn complete(&self, prompt: &str, credential: &str) -> crate::Result<String>;
}

// ============================================================================
// Credentials
// ============================================================================

/// Non-empty, ordered set of API keys.
#[derive(Clone)]
pub struct CredentialPool {
    keys: Vec<String>,
}

impl CredentialPool {
    /// Build a pool, dropping blank and repeated keys.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no usable key remains.
    pub fn new<I, S>(keys: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for key in keys {
            let key = key.into().trim().to_string();
            if !key.is_empty() && !unique.contains(&key) {
                unique.push(key);
            }
        }
        if unique.is_empty() {
            return Err(Error::config(
                "No API keys available. Set HARSTAT_API_KEYS or GEMINI_API_KEY, or add api_keys to the config file.",
            ));
        }
        Ok(Self { keys: unique })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Key assigned to chunk `index` under round-robin assignment.
    pub fn for_chunk(&self, index: usize) -> &str {
        &self.keys[index % self.keys.len()]
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("keys", &format_args!("<{} redacted>", self.keys.len()))
            .finish()
    }
}

/// How credentials are spent on chunk requests.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStrategy {
    /// Every call walks the pool in order until one key succeeds.
    Sequential,
    /// Chunk `i` always uses key `i mod pool size`.
    #[default]
    RoundRobin,
}

// ============================================================================
// Completion parsing
// ============================================================================

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[A-Za-z0-9_-]*").expect("valid fence pattern"));

/// Parse a completion into record objects.
///
/// Code fences are removed and the text between the first `[` and the last
/// `]` is parsed as JSON. Non-object array elements are ignored.
pub fn parse_completion(text: &str) -> crate::Result<Vec<JsonMap<String, JsonValue>>> {
    let cleaned = CODE_FENCE.replace_all(text, "");
    let (Some(start), Some(end)) = (cleaned.find('['), cleaned.rfind(']')) else {
        return Err(Error::oracle("array not found in completion"));
    };
    if end < start {
        return Err(Error::oracle("array not found in completion"));
    }

    match serde_json::from_str::<JsonValue>(&cleaned[start..=end])? {
        JsonValue::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                JsonValue::Object(map) => Some(map),
                _ => None,
            })
            .collect()),
        JsonValue::Object(map) => Ok(vec![map]),
        other => Err(Error::oracle(format!(
            "expected a JSON array or object, got {}",
            other
        ))),
    }
}

// ============================================================================
// Extraction driver
// ============================================================================

/// Runs extraction prompts against an [`Oracle`] with retries and fallback.
#[derive(Clone)]
pub struct OracleExtractor {
    oracle: Arc<dyn Oracle>,
    credentials: CredentialPool,
    max_attempts: usize,
    strategy: CredentialStrategy,
}

impl OracleExtractor {
    pub fn new(oracle: Arc<dyn Oracle>, credentials: CredentialPool) -> Self {
        Self {
            oracle,
            credentials,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            strategy: CredentialStrategy::default(),
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: CredentialStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn credentials(&self) -> &CredentialPool {
        &self.credentials
    }

    pub fn strategy(&self) -> CredentialStrategy {
        self.strategy
    }

    /// Try each credential in order until one call succeeds.
    ///
    /// # Errors
    ///
    /// [`Error::CredentialsExhausted`] when every credential failed.
    pub async fn complete_with_fallback(&self, prompt: &str) -> crate::Result<String> {
        let mut last = String::new();
        for (i, key) in self.credentials.iter().enumerate() {
            match self.oracle.complete(prompt, key).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    log::warn!("Credential #{} failed: {}", i + 1, e);
                    last = e.to_string();
                }
            }
        }
        Err(Error::CredentialsExhausted {
            tried: self.credentials.len(),
            last,
        })
    }

    async fn complete_for_chunk(&self, index: usize, prompt: &str) -> crate::Result<String> {
        match self.strategy {
            CredentialStrategy::Sequential => self.complete_with_fallback(prompt).await,
            CredentialStrategy::RoundRobin => {
                self.oracle
                    .complete(prompt, self.credentials.for_chunk(index))
                    .await
            }
        }
    }

    /// Extract records from one chunk.
    ///
    /// Every failed attempt (service error, no array, bad JSON) consumes one
    /// of the attempts; when they run out the chunk contributes nothing.
    pub async fn extract_chunk(&self, index: usize, chunk: &str, label: &str) -> Vec<RawRecord> {
        let prompt = extraction_prompt(label, chunk);
        for attempt in 1..=self.max_attempts {
            let outcome = self
                .complete_for_chunk(index, &prompt)
                .await
                .and_then(|text| parse_completion(&text));
            match outcome {
                Ok(records) => {
                    log::debug!(
                        "Chunk {} yielded {} records on attempt {}",
                        index,
                        records.len(),
                        attempt
                    );
                    return records.into_iter().map(RawRecord::Oracle).collect();
                }
                Err(e) => log::warn!(
                    "Chunk {} attempt {}/{} failed: {}",
                    index,
                    attempt,
                    self.max_attempts,
                    e
                ),
            }
        }
        log::warn!("Giving up on chunk {} after {} attempts", index, self.max_attempts);
        Vec::new()
    }
}

// ============================================================================
// Gemini
// ============================================================================

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model for extraction prompts.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default base URL of the Gemini REST API.
pub fn default_base_url() -> Url {
    Url::parse(GEMINI_API_BASE).expect("valid Gemini base URL")
}

/// Google Gemini `generateContent` client.
pub struct GeminiOracle {
    client: reqwest::Client,
    model: String,
    base_url: Url,
}

impl GeminiOracle {
    /// Create a client for `model` with a request timeout.
    pub fn new(model: impl Into<String>, timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            model: model.into(),
            base_url: default_base_url(),
        })
    }

    /// Create with a custom base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.as_str().trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

#[async_trait]
impl Oracle for GeminiOracle {
    async fn complete(&self, prompt: &str, credential: &str) -> crate::Result<String> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", credential)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {e}>"));
            return Err(Error::oracle(format!(
                "Gemini API error (HTTP {}): {}",
                status, detail
            )));
        }

        let parsed: GenerateResponse = response.json().await?;
        parsed
            .text()
            .ok_or_else(|| Error::oracle("Gemini response contained no text"))
    }
}
