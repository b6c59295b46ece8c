//! Record extraction strategies.
//!
//! Two strategies turn payload text into loosely typed records:
//!
//! - [`mapper`] walks the known analytics response shape and reads fields by
//!   their technical keys. Deterministic, no I/O.
//! - [`oracle`] asks a text completion service to do the mapping, one chunk
//!   at a time, with bounded retries and credential fallback.
//!
//! Both return [`RawRecord`]s and never fail; a strategy that cannot produce
//! anything returns an empty list. The records are turned into typed rows
//! by [`crate::merge`].

pub mod mapper;
pub mod oracle;
pub mod prompt;

use serde_json::{Map as JsonMap, Value as JsonValue};

pub use mapper::map_payload;
pub use oracle::{CredentialPool, CredentialStrategy, GeminiOracle, Oracle, OracleExtractor};

/// A record as produced by an extraction strategy, before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    /// Produced by the deterministic mapper; keys are canonical columns.
    Mapped(JsonMap<String, JsonValue>),
    /// Returned by the completion service; keys are whatever it answered.
    Oracle(JsonMap<String, JsonValue>),
}

impl RawRecord {
    pub fn fields(&self) -> &JsonMap<String, JsonValue> {
        match self {
            Self::Mapped(fields) | Self::Oracle(fields) => fields,
        }
    }

    pub fn is_oracle(&self) -> bool {
        matches!(self, Self::Oracle(_))
    }
}
