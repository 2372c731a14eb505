// src/error.rs
//! Error taxonomy for the ingestion pipeline.
//!
//! Structural problems (bad cache lines, failed scrapes, malformed records,
//! bad month input) are fatal and surface with the offending line/record.
//! Per-record conditions (unparsable review dates, empty or failed fallback
//! lookups) never reach these types; they are absorbed where they happen.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access record file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed record at {path}:{line_no}: {source}; line: {line}")]
    MalformedRecord {
        path: PathBuf,
        line_no: usize,
        line: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode record for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io { path: path.into(), source }
    }
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to launch scraper `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("scraper exited with {}: {stderr}", exit_label(.code))]
    Process { code: Option<i32>, stderr: String },
    #[error("scraper timed out after {after:?}: {stderr}")]
    Timeout { after: Duration, stderr: String },
    #[error("scraper cancelled: {stderr}")]
    Cancelled { stderr: String },
    #[error("scraper i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => s!("a signal"),
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no API key configured for the review lookup service")]
    MissingApiKey,
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("review lookup for `{identifier}` failed: {source}")]
    Http {
        identifier: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("review lookup for `{identifier}` returned HTTP {status}")]
    Status { identifier: String, status: u16 },
    #[error("review lookup for `{identifier}` returned an error: {message}")]
    Api { identifier: String, message: String },
    #[error("review lookup for `{identifier}` returned an unexpected body: {source}")]
    Decode {
        identifier: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("missing 'categories' in place: {record}")]
    MissingCategories { record: String },
    #[error("missing keys {missing:?} in record: {record}")]
    MissingField { missing: Vec<String>, record: String },
    #[error("rating {rating} outside 1-5 in review: {record}")]
    InvalidRating { rating: u8, record: String },
    #[error("month must be an integer from 1 to 12, got {got:?}")]
    InvalidMonth { got: String },
    #[error("failed to shape record: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("text generation failed: {0}")]
    Generator(String),
    #[error("no JSON object found in generated text: {0}")]
    NoJson(String),
    #[error("rendering failed: {0}")]
    Render(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("scrape failed: {0}")]
    ScrapeFailed(#[from] ScrapeError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("failed to set up review lookup: {0}")]
    Fallback(#[from] FetchError),
}
