// src/orchestrator.rs
//! Cache-aware scrape orchestration.
//!
//! ```text
//! CHECK_CACHE ──hit──────────────────────────────────────────────▶ DONE
//!      │ miss / stale
//!      ▼
//! ROTATE_BACKUP → INVOKE_SCRAPE → REPAIR_MISSING → PERSIST_IF_REPAIRED → DONE
//! ```
//!
//! Only the orchestrator writes the record file, and only after the previous
//! file has been rotated aside. A failed scrape stops the run; a failed review
//! lookup only affects its own record.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::config::GeoArgs;
use crate::config::consts::WORKERS;
use crate::error::{FetchError, PipelineError};
use crate::fallback::ReviewFetcher;
use crate::progress::Progress;
use crate::record::{PlaceRecord, Review};
use crate::scrape::ScrapeInvoker;
use crate::store::RecordStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    CheckCache,
    RotateBackup,
    InvokeScrape,
    RepairMissing,
    PersistIfRepaired,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::CheckCache => "check-cache",
            Stage::RotateBackup => "rotate-backup",
            Stage::InvokeScrape => "invoke-scrape",
            Stage::RepairMissing => "repair-missing",
            Stage::PersistIfRepaired => "persist-if-repaired",
            Stage::Done => "done",
        })
    }
}

/// Where the returned records came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordSource {
    Cache,
    Scraped,
    /// Fresh scrape with `count` records filled in by the fallback lookup.
    Repaired { count: usize },
}

#[derive(Debug)]
pub struct Harvest {
    pub records: Vec<PlaceRecord>,
    pub source: RecordSource,
    /// Set when an existing file was rotated aside.
    pub backup: Option<PathBuf>,
}

pub struct Orchestrator<'a> {
    store: RecordStore,
    invoker: &'a dyn ScrapeInvoker,
    fetcher: &'a dyn ReviewFetcher,
    geo: GeoArgs,
    workers: usize,
    pause: Duration,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        store: RecordStore,
        invoker: &'a dyn ScrapeInvoker,
        fetcher: &'a dyn ReviewFetcher,
    ) -> Self {
        Self {
            store,
            invoker,
            fetcher,
            geo: GeoArgs::default(),
            workers: WORKERS,
            pause: Duration::ZERO,
        }
    }

    pub fn with_geo(mut self, geo: GeoArgs) -> Self {
        self.geo = geo;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Pause each worker takes between lookups.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn run(
        &self,
        reuse_cache: bool,
        mut progress: Option<&mut dyn Progress>,
    ) -> Result<Harvest, PipelineError> {
        let path = self.store.path();

        // CHECK_CACHE
        logd!("Orchestrator: Stage={} reuse_cache={reuse_cache}", Stage::CheckCache);
        if reuse_cache && self.store.exists() {
            let records = self.store.read()?;
            logf!("Cache: Hit {} records={}", path.display(), records.len());
            logd!("Orchestrator: Stage={}", Stage::Done);
            return Ok(Harvest { records, source: RecordSource::Cache, backup: None });
        }
        if reuse_cache {
            logf!("Cache: Miss {}", path.display());
        }

        let fresh = self.scrape_and_repair(progress.as_deref_mut().map(|p| p as &mut dyn Progress));
        if let Some(p) = progress.as_deref_mut() {
            p.finish();
        }
        let (records, repaired, backup) = fresh?;

        let source = if repaired > 0 {
            RecordSource::Repaired { count: repaired }
        } else {
            RecordSource::Scraped
        };
        logd!("Orchestrator: Stage={}", Stage::Done);
        Ok(Harvest { records, source, backup })
    }

    // ROTATE_BACKUP → INVOKE_SCRAPE → REPAIR_MISSING → PERSIST_IF_REPAIRED
    fn scrape_and_repair(
        &self,
        mut progress: Option<&mut dyn Progress>,
    ) -> Result<(Vec<PlaceRecord>, usize, Option<PathBuf>), PipelineError> {
        let path = self.store.path();

        logd!("Orchestrator: Stage={}", Stage::RotateBackup);
        let backup = self.store.rotate()?;
        self.store.prepare_dir()?;

        logd!("Orchestrator: Stage={}", Stage::InvokeScrape);
        if let Some(p) = progress.as_deref_mut() {
            p.begin(&Stage::InvokeScrape.to_string(), 1);
            p.log("Running scraper…");
        }
        self.invoker.invoke(path, &self.geo)?;
        let mut records = self.store.read()?;
        logf!("Scrape: Produced {} records at {}", records.len(), path.display());

        logd!("Orchestrator: Stage={}", Stage::RepairMissing);
        let repaired = repair_missing(
            &mut records,
            self.fetcher,
            self.workers,
            self.pause,
            progress.as_deref_mut().map(|p| p as &mut dyn Progress),
        );

        logd!("Orchestrator: Stage={} repaired={repaired}", Stage::PersistIfRepaired);
        if repaired > 0 {
            self.store.write(&records)?;
            logf!("Cache: Saved {} repaired records → {}", repaired, path.display());
        }
        Ok((records, repaired, backup))
    }
}

/// Fill in reviews for every record whose list is absent or empty.
/// Lookups run on a bounded pool; each result is written back to its own index,
/// so record order is untouched. Returns how many records gained reviews.
pub fn repair_missing(
    records: &mut [PlaceRecord],
    fetcher: &dyn ReviewFetcher,
    workers: usize,
    pause: Duration,
    mut progress: Option<&mut dyn Progress>,
) -> usize {
    let mut jobs: Vec<(usize, String)> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        if !rec.missing_reviews() {
            continue;
        }
        match rec.identifier() {
            Some(id) => jobs.push((i, s!(id))),
            None => logw!("Repair: No identifier for '{}', skipping", rec.display_title()),
        }
    }

    if jobs.is_empty() {
        logd!("Repair: Nothing to repair");
        return 0;
    }

    if let Some(p) = progress.as_deref_mut() {
        p.begin(&Stage::RepairMissing.to_string(), jobs.len());
    }
    logf!("Repair: Fetching reviews for {} records", jobs.len());

    let workers = workers.min(jobs.len()).max(1);
    let next = AtomicUsize::new(0);
    let (res_tx, res_rx) = mpsc::channel::<(usize, Result<Vec<Review>, FetchError>)>();
    let mut repaired = 0usize;

    thread::scope(|scope| {
        for _ in 0..workers {
            let jobs = &jobs;
            let next = &next;
            let tx = res_tx.clone();

            scope.spawn(move || {
                loop {
                    let j = next.fetch_add(1, Ordering::Relaxed);
                    if j >= jobs.len() {
                        break;
                    }
                    let result = fetcher.fetch_reviews(&jobs[j].1);
                    if tx.send((j, result)).is_err() {
                        break;
                    }
                    if !pause.is_zero() {
                        thread::sleep(pause); // be polite
                    }
                }
            });
        }
        drop(res_tx); // this thread is the sole receiver now

        for (j, result) in res_rx {
            let (idx, id) = &jobs[j];
            let rec = &mut records[*idx];
            match result {
                Ok(reviews) => {
                    let found = reviews.len();
                    if found > 0 {
                        repaired += 1;
                        logf!("Repair: '{}' id={id} reviews={found}", rec.display_title());
                    } else {
                        logf!("Repair: '{}' id={id} has no reviews", rec.display_title());
                    }
                    rec.reviews_extended = Some(reviews);
                    if let Some(p) = progress.as_deref_mut() {
                        p.item_done(*idx, rec.display_title(), found);
                    }
                }
                Err(e) => {
                    loge!("Repair: '{}' id={id}: {e}", rec.display_title());
                    rec.reviews_extended.get_or_insert_with(Vec::new);
                    if let Some(p) = progress.as_deref_mut() {
                        p.item_failed(*idx, rec.display_title());
                    }
                }
            }
        }
    });

    repaired
}
