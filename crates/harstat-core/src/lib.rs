//! harstat Core Library
//!
//! This library turns a browser network capture (HAR file) into a daily
//! hotel performance report. It locates the analytics responses in the
//! capture, compacts their payloads, extracts ten fields per day either
//! directly or through a text completion service, and merges the result
//! into one canonical table that can be exported as a spreadsheet.

pub mod chunk;
pub mod config;
pub mod error;
pub mod extract;
pub mod har;
pub mod locator;
pub mod merge;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod report;

pub use crate::{
    config::{Config, ExtractionMode},
    error::{Error, Result},
    extract::{CredentialPool, CredentialStrategy, GeminiOracle, Oracle, RawRecord},
    har::{Capture, Entry},
    metrics::{Metric, MetricRecord, Table},
    pipeline::{Outcome, Pipeline},
};
