// src/pipeline.rs
//! Pipeline entry: month + cache path + reuse flag → canonical batch.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

use crate::config::PipelineOptions;
use crate::error::PipelineError;
use crate::fallback::{ReviewFetcher, SerpApiFetcher};
use crate::orchestrator::{Orchestrator, RecordSource};
use crate::progress::Progress;
use crate::record::{DealershipBatchItem, Month, MonthSpec};
use crate::schema;
use crate::scrape::{ProcessInvoker, ScrapeInvoker};
use crate::store::RecordStore;

/// Result of one run, with enough context for the caller to report on it.
#[derive(Debug)]
pub struct PipelineOutput {
    pub month: Month,
    pub batch: Vec<DealershipBatchItem>,
    /// Places read before filtering.
    pub places: usize,
    pub source: RecordSource,
    pub backup: Option<PathBuf>,
}

pub struct Pipeline<'a> {
    opts: PipelineOptions,
    invoker: &'a dyn ScrapeInvoker,
    fetcher: &'a dyn ReviewFetcher,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        opts: PipelineOptions,
        invoker: &'a dyn ScrapeInvoker,
        fetcher: &'a dyn ReviewFetcher,
    ) -> Self {
        Self { opts, invoker, fetcher }
    }

    pub fn run(
        &self,
        month: MonthSpec,
        cache_path: &Path,
        reuse_cache: bool,
        progress: Option<&mut dyn Progress>,
    ) -> Result<PipelineOutput, PipelineError> {
        self.run_on(Local::now().date_naive(), month, cache_path, reuse_cache, progress)
    }

    /// `run` with an explicit "today", which is what `MonthSpec::Current` resolves against.
    pub fn run_on(
        &self,
        today: NaiveDate,
        month: MonthSpec,
        cache_path: &Path,
        reuse_cache: bool,
        progress: Option<&mut dyn Progress>,
    ) -> Result<PipelineOutput, PipelineError> {
        let month = month.resolve(today);
        logf!("Pipeline: Begin month={} ({}) cache={} reuse={reuse_cache}",
            month, month.name(), cache_path.display());

        let orchestrator = Orchestrator::new(RecordStore::new(cache_path), self.invoker, self.fetcher)
            .with_geo(self.opts.scrape.geo.clone())
            .with_workers(self.opts.workers)
            .with_pause(self.opts.fallback.pause);
        let harvest = orchestrator.run(reuse_cache, progress)?;

        let batch = schema::build_batch(&harvest.records, month)?;
        logf!("Pipeline: Done source={:?} places={} dealerships={}",
            harvest.source, harvest.records.len(), batch.len());

        Ok(PipelineOutput {
            month,
            batch,
            places: harvest.records.len(),
            source: harvest.source,
            backup: harvest.backup,
        })
    }
}

/// Run with the real scraper process and lookup service from `opts`.
pub fn run(
    month: MonthSpec,
    cache_path: impl AsRef<Path>,
    reuse_cache: bool,
    opts: &PipelineOptions,
) -> Result<Vec<DealershipBatchItem>, PipelineError> {
    let invoker = ProcessInvoker::new(opts.scrape.clone());
    let fetcher = SerpApiFetcher::new(opts.fallback.clone())?;
    if !fetcher.has_api_key() {
        logw!("Fallback: No API key set; records without reviews stay empty");
    }
    let pipeline = Pipeline::new(opts.clone(), &invoker, &fetcher);
    pipeline
        .run(month, cache_path.as_ref(), reuse_cache, None)
        .map(|out| out.batch)
}
