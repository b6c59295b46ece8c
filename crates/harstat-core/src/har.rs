//! HAR parsing for recorded analytics traffic.
//!
//! This module provides a small parser for HAR (HTTP Archive) files. Only
//! the parts of an entry the extraction pipeline looks at are modelled: the
//! request URL, the response status, and the response content (MIME type,
//! body text, and its optional transport encoding). Everything else in the
//! archive is ignored during deserialisation.

use std::borrow::Cow;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use tokio::fs;

use crate::Error;

/// Top level structure for a HAR file.
#[derive(Debug, Deserialize)]
struct HarFile {
    log: HarLog,
}

#[derive(Debug, Deserialize)]
struct HarLog {
    entries: Vec<Entry>,
}

/// One recorded request/response exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub request: Request,
    #[serde(default)]
    pub response: Response,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub content: Content,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Content {
    #[serde(default, rename = "mimeType")]
    pub mime_type: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub text: String,
    #[serde(default)]
    pub encoding: ContentEncoding,
}

/// Transport encoding applied to a recorded response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "Option<String>")]
pub enum ContentEncoding {
    #[default]
    None,
    Base64,
}

impl From<Option<String>> for ContentEncoding {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(enc) if enc.eq_ignore_ascii_case("base64") => Self::Base64,
            _ => Self::None,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Entry {
    pub fn url(&self) -> &str {
        &self.request.url
    }

    pub fn status(&self) -> i64 {
        self.response.status
    }

    pub fn mime_type(&self) -> &str {
        &self.response.content.mime_type
    }

    /// Status in `[200, 300)`.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.response.status)
    }

    pub fn is_json(&self) -> bool {
        self.mime_type().to_ascii_lowercase().contains("json")
    }

    /// Response body as text, with base64 transport encoding removed.
    ///
    /// A body that claims to be base64 but does not decode (or decodes to
    /// invalid UTF-8) is returned as recorded.
    pub fn body_text(&self) -> Cow<'_, str> {
        let content = &self.response.content;
        match content.encoding {
            ContentEncoding::None => Cow::Borrowed(&content.text),
            ContentEncoding::Base64 => match decode_base64(&content.text) {
                Some(text) => Cow::Owned(text),
                None => {
                    log::warn!(
                        "Could not decode base64 body of {}; using raw text",
                        self.url()
                    );
                    Cow::Borrowed(&content.text)
                }
            },
        }
    }
}

fn decode_base64(text: &str) -> Option<String> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = BASE64.decode(compact.as_bytes()).ok()?;
    String::from_utf8(bytes).ok()
}

/// Parsed representation of a HAR file.
#[derive(Debug, Clone)]
pub struct Capture {
    entries: Vec<Entry>,
}

impl Capture {
    /// Parse a HAR document held in memory.
    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        let har: HarFile = serde_json::from_slice(bytes)
            .map_err(|e| Error::capture(format!("Failed to parse HAR: {}", e)))?;
        Ok(Self {
            entries: har.log.entries,
        })
    }

    /// Load a HAR file from disk.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read(&path).await?;
        let har: HarFile = serde_json::from_slice(&content).map_err(|e| {
            Error::capture(format!(
                "Failed to parse HAR {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(Self {
            entries: har.log.entries,
        })
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<Entry>> for Capture {
    fn from(entries: Vec<Entry>) -> Self {
        Self { entries }
    }
}

#[cfg(test)]
pub(crate) fn entry(url: &str, status: i64, mime: &str, text: &str) -> Entry {
    Entry {
        request: Request { url: url.into() },
        response: Response {
            status,
            content: Content {
                mime_type: mime.into(),
                text: text.into(),
                encoding: ContentEncoding::None,
            },
        },
    }
}
