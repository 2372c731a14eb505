// src/scrape/mod.rs
//! External scraper invocation.
//!
//! The orchestrator only sees `ScrapeInvoker`; how the process is started
//! (directly, or through a compatibility shell) lives in `process`.
//! Invokers never retry. A non-zero exit is `ScrapeError::Process`.

use std::path::Path;
use std::time::Duration;

use crate::config::GeoArgs;
use crate::error::ScrapeError;

mod process;

pub use process::ProcessInvoker;

/// What a successful scraper run left behind, besides the output file.
#[derive(Clone, Debug, Default)]
pub struct ScrapeRun {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

pub trait ScrapeInvoker {
    /// Run the scraper so that it writes line-delimited JSON to `output`.
    fn invoke(&self, output: &Path, geo: &GeoArgs) -> Result<ScrapeRun, ScrapeError>;
}
