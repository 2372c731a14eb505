// src/cli.rs
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::WrapErr;

use crate::config::PipelineOptions;
use crate::config::consts::DEFAULT_CACHE_PATH;
use crate::fallback::SerpApiFetcher;
use crate::log::LogTarget;
use crate::orchestrator::RecordSource;
use crate::pipeline::Pipeline;
use crate::progress::Progress;
use crate::record::{DealershipBatchItem, MonthSpec};
use crate::scrape::ProcessInvoker;

/// Scrape dealership places, repair missing reviews, and emit one month's batch.
#[derive(Debug, Parser)]
#[command(name = "dealer_scrape", version, about)]
pub struct Args {
    /// Month to keep reviews for: 1-12 or "current".
    #[arg(short, long, default_value = "current")]
    pub month: MonthSpec,

    /// Use the cached record file when it exists instead of scraping.
    #[arg(long)]
    pub reuse_cache: bool,

    #[arg(long, default_value = DEFAULT_CACHE_PATH)]
    pub cache_path: PathBuf,

    /// Scraper executable (overrides DEALER_SCRAPE_BIN).
    #[arg(long)]
    pub scraper: Option<PathBuf>,

    /// Kill the scraper after this many seconds; 0 waits forever.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Concurrent review lookups.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Append logs here instead of stderr.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Batch as JSON lines; stdout when absent.
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

impl Args {
    /// Environment first, then flags on top.
    pub fn options(&self) -> PipelineOptions {
        let mut opts = PipelineOptions::from_env();
        if let Some(bin) = &self.scraper {
            opts.scrape.executable = bin.clone();
        }
        match self.timeout_secs {
            Some(0) => opts.scrape.timeout = None,
            Some(secs) => opts.scrape.timeout = Some(Duration::from_secs(secs)),
            None => {}
        }
        if let Some(n) = self.workers {
            opts.workers = n.max(1);
        }
        opts
    }
}

pub fn run() -> color_eyre::Result<()> {
    let args = Args::parse();

    let target = args.log_file.clone().map(LogTarget::File).unwrap_or_default();
    crate::log::init(target).wrap_err("failed to set up logging")?;

    let opts = args.options();
    let invoker = ProcessInvoker::new(opts.scrape.clone());
    let fetcher = SerpApiFetcher::new(opts.fallback.clone())?;
    if !fetcher.has_api_key() {
        logw!("Fallback: No API key set; records without reviews stay empty");
    }

    let mut progress = StderrProgress::default();
    let out = Pipeline::new(opts, &invoker, &fetcher).run(
        args.month,
        &args.cache_path,
        args.reuse_cache,
        Some(&mut progress),
    )?;

    match out.source {
        RecordSource::Cache => eprintln!("Using cached records from {}", args.cache_path.display()),
        RecordSource::Scraped => eprintln!("Scraped {} places", out.places),
        RecordSource::Repaired { count } => {
            eprintln!("Scraped {} places, repaired reviews for {count}", out.places)
        }
    }
    if let Some(backup) = &out.backup {
        eprintln!("Previous records kept at {}", backup.display());
    }
    eprintln!("{} dealerships for {}", out.batch.len(), out.month.name());

    match &args.out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let file = File::create(path).wrap_err_with(|| format!("creating {}", path.display()))?;
            write_batch(BufWriter::new(file), &out.batch)?;
            eprintln!("Wrote {}", path.display());
        }
        None => write_batch(io::stdout().lock(), &out.batch)?,
    }
    Ok(())
}

fn write_batch<W: Write>(mut w: W, batch: &[DealershipBatchItem]) -> io::Result<()> {
    for item in batch {
        serde_json::to_writer(&mut w, item)?;
        w.write_all(b"\n")?;
    }
    w.flush()
}

/// Plain-text progress on stderr.
#[derive(Default)]
struct StderrProgress {
    stage: String,
    total: usize,
    done: usize,
}

impl Progress for StderrProgress {
    fn begin(&mut self, stage: &str, total: usize) {
        self.stage = s!(stage);
        self.total = total;
        self.done = 0;
        eprintln!("[{stage}] {total} item(s)");
    }

    fn log(&mut self, msg: &str) {
        eprintln!("[{}] {msg}", self.stage);
    }

    fn item_done(&mut self, _index: usize, title: &str, found: usize) {
        self.done += 1;
        eprintln!("[{}] {}/{} {title}: {found} review(s)", self.stage, self.done, self.total);
    }

    fn item_failed(&mut self, _index: usize, title: &str) {
        self.done += 1;
        eprintln!("[{}] {}/{} {title}: lookup failed", self.stage, self.done, self.total);
    }

    fn finish(&mut self) {
        eprintln!("[{}] done", self.stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse() {
        let args = Args::try_parse_from([
            "cli", "-m", "7", "--reuse-cache", "--timeout-secs", "0", "--workers", "2", "-o", "out.jsonl",
        ])
        .unwrap();
        assert_eq!(args.month, MonthSpec::Fixed(crate::record::Month::new(7).unwrap()));
        assert!(args.reuse_cache);
        assert_eq!(args.cache_path, PathBuf::from(DEFAULT_CACHE_PATH));
        let opts = args.options();
        assert_eq!(opts.scrape.timeout, None);
        assert_eq!(opts.workers, 2);
    }

    #[test]
    fn month_defaults_to_current_and_rejects_13() {
        let args = Args::try_parse_from(["cli"]).unwrap();
        assert_eq!(args.month, MonthSpec::Current);
        assert!(Args::try_parse_from(["cli", "--month", "13"]).is_err());
    }

    #[test]
    fn batch_is_json_lines() {
        let item = DealershipBatchItem {
            title: s!("A"),
            review_count: 1,
            review_rating: 5.0,
            reviews_per_rating: Default::default(),
            reviews_extended: vec![],
        };
        let mut buf = Vec::new();
        write_batch(&mut buf, &[item.clone(), item]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("{\"title\":\"A\""));
    }
}
