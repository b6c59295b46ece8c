//! End-to-end extraction: capture in, canonical table out.
//!
//! ```text
//! Capture -> locate -> normalize -> (chunk -> oracle | mapper) -> merge -> Table
//! ```
//!
//! Everything before and after the extraction step runs on the calling task.
//! In oracle mode the chunk requests run concurrently, at most `workers` at a
//! time. Their results are merged in chunk order regardless of which request
//! finishes first.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::chunk::chunk;
use crate::config::{Config, ExtractionMode};
use crate::extract::oracle::{CredentialPool, GeminiOracle, Oracle, OracleExtractor};
use crate::extract::{RawRecord, map_payload};
use crate::har::Capture;
use crate::locator::locate;
use crate::merge::merge;
use crate::metrics::Table;
use crate::normalize::normalize;

/// Result of a run that did not hit a hard error.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// At least one row was extracted.
    Table(Table),
    /// No capture entry looked like a metrics response.
    NoEntries,
    /// Entries were found but no record survived extraction and merging.
    NoRecords { entries: usize },
}

impl Outcome {
    pub fn table(&self) -> Option<&Table> {
        match self {
            Self::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn into_table(self) -> Option<Table> {
        match self {
            Self::Table(table) => Some(table),
            _ => None,
        }
    }
}

enum Strategy {
    Mapper,
    Oracle {
        extractor: OracleExtractor,
        workers: usize,
    },
}

/// A configured extraction pipeline.
pub struct Pipeline {
    config: Config,
    strategy: Strategy,
}

impl Pipeline {
    /// Build the pipeline described by `config`.
    ///
    /// In oracle mode this resolves the API keys first, so a missing key is
    /// reported before any capture is read.
    pub async fn from_config(config: Config) -> crate::Result<Self> {
        config.validate()?;
        match config.mode {
            ExtractionMode::Mapper => Self::mapper(config),
            ExtractionMode::Oracle => {
                let credentials = config.credentials().await?;
                let oracle = GeminiOracle::new(config.model.clone(), config.request_timeout())?
                    .with_base_url(config.base_url.clone());
                Self::with_oracle(config, Arc::new(oracle), credentials)
            }
        }
    }

    /// Pipeline using the deterministic mapper.
    pub fn mapper(config: Config) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            strategy: Strategy::Mapper,
        })
    }

    /// Pipeline prompting `oracle` with the given keys.
    pub fn with_oracle(
        config: Config,
        oracle: Arc<dyn Oracle>,
        credentials: CredentialPool,
    ) -> crate::Result<Self> {
        config.validate()?;
        let workers = config.workers.unwrap_or(credentials.len()).max(1);
        let extractor = OracleExtractor::new(oracle, credentials)
            .with_max_attempts(config.max_attempts)
            .with_strategy(config.credential_strategy);
        Ok(Self {
            config,
            strategy: Strategy::Oracle { extractor, workers },
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Concurrent chunk requests; 1 in mapper mode.
    pub fn workers(&self) -> usize {
        match &self.strategy {
            Strategy::Mapper => 1,
            Strategy::Oracle { workers, .. } => *workers,
        }
    }

    /// Parse `har` and run the pipeline on it.
    ///
    /// # Errors
    ///
    /// Only an unreadable capture is an error; every "nothing found" case is
    /// an [`Outcome`].
    pub async fn run(&self, har: &[u8], label: &str) -> crate::Result<Outcome> {
        let capture = Capture::from_slice(har)?;
        Ok(self.run_capture(&capture, label).await)
    }

    /// Run the pipeline on an already parsed capture.
    pub async fn run_capture(&self, capture: &Capture, label: &str) -> Outcome {
        let prefix = self.config.locator.payload_prefix.as_str();
        let entries = locate(capture, &self.config.locator);
        if entries.is_empty() {
            log::info!("No metrics responses among {} entries", capture.len());
            return Outcome::NoEntries;
        }
        log::info!("Located {} metrics responses", entries.len());

        let texts: Vec<String> = entries.iter().map(|e| normalize(e, prefix)).collect();
        let batches: Vec<Vec<RawRecord>> = match &self.strategy {
            Strategy::Mapper => texts.iter().map(|text| map_payload(text, prefix)).collect(),
            Strategy::Oracle { extractor, workers } => {
                let joined = texts.join("\n");
                let chunks = chunk(&joined, self.config.chunk_size);
                log::info!(
                    "Sending {} chunks to {} with {} workers",
                    chunks.len(),
                    self.config.model,
                    workers
                );
                stream::iter(chunks.iter().enumerate())
                    .map(|(index, text)| extractor.extract_chunk(index, text, label))
                    .buffered(*workers)
                    .collect()
                    .await
            }
        };

        let table = merge(batches, label);
        if table.is_empty() {
            log::info!("No records extracted from {} entries", entries.len());
            Outcome::NoRecords {
                entries: entries.len(),
            }
        } else {
            log::info!("Extracted {} rows", table.len());
            Outcome::Table(table)
        }
    }
}
