// src/config/options.rs
use std::path::PathBuf;
use std::time::Duration;

use super::consts::*;

/// Everything one pipeline run needs. Built once by the caller and passed down;
/// no stage reads process-wide state on its own.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineOptions {
    pub scrape: ScrapeOptions,
    pub fallback: FallbackOptions,
    /// Upper bound on concurrent fallback lookups.
    pub workers: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            scrape: ScrapeOptions::default(),
            fallback: FallbackOptions::default(),
            workers: WORKERS,
        }
    }
}

impl PipelineOptions {
    /// Defaults overlaid with `DEALER_SCRAPE_*` / `SERP_API_KEY` from the environment.
    pub fn from_env() -> Self {
        let mut opts = Self::default();
        opts.apply_env(|key| std::env::var(key).ok());
        opts
    }

    /// Overlay values from `lookup`. Unparsable values are logged and skipped.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bin) = lookup(ENV_SCRAPER_BIN).filter(|v| !v.trim().is_empty()) {
            self.scrape.executable = PathBuf::from(bin.trim());
        }

        if let Some(raw) = lookup(ENV_GEO) {
            match GeoArgs::parse_center(&raw) {
                Some((lat, lon)) => {
                    self.scrape.geo.lat = lat;
                    self.scrape.geo.lon = lon;
                }
                None => logw!("Config: ignoring {ENV_GEO}={raw:?} (expected \"lat,lon\")"),
            }
        }

        if let Some(raw) = lookup(ENV_ZOOM) {
            match raw.trim().parse::<u8>() {
                Ok(z) => self.scrape.geo.zoom = z,
                Err(_) => logw!("Config: ignoring {ENV_ZOOM}={raw:?}"),
            }
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(0) => self.scrape.timeout = None,
                Ok(secs) => self.scrape.timeout = Some(Duration::from_secs(secs)),
                Err(_) => logw!("Config: ignoring {ENV_TIMEOUT_SECS}={raw:?}"),
            }
        }

        if let Some(raw) = lookup(ENV_WORKERS) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.workers = n,
                _ => logw!("Config: ignoring {ENV_WORKERS}={raw:?}"),
            }
        }

        if let Some(key) = lookup(ENV_SERP_API_KEY).filter(|v| !v.trim().is_empty()) {
            self.fallback.api_key = Some(key.trim().to_string());
        }
    }
}

/// Geographic centre and zoom handed to the scraper.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoArgs {
    pub lat: f64,
    pub lon: f64,
    pub zoom: u8,
}

impl Default for GeoArgs {
    fn default() -> Self {
        Self { lat: GEO_LAT, lon: GEO_LON, zoom: GEO_ZOOM }
    }
}

impl GeoArgs {
    /// "lat,lon" as the scraper expects it.
    pub fn center(&self) -> String {
        format!("{},{}", self.lat, self.lon)
    }

    pub fn parse_center(s: &str) -> Option<(f64, f64)> {
        let (lat, lon) = s.split_once(',')?;
        let lat: f64 = lat.trim().parse().ok()?;
        let lon: f64 = lon.trim().parse().ok()?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        Some((lat, lon))
    }
}

/// How the scraper process gets started on this platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Launcher {
    /// Run the executable directly.
    Direct,
    /// Run it through a compatibility shell, e.g. `wsl` on Windows.
    CompatShell { program: String, args: Vec<String> },
}

impl Launcher {
    pub fn for_platform() -> Self {
        if cfg!(windows) {
            Launcher::CompatShell { program: s!("wsl"), args: Vec::new() }
        } else {
            Launcher::Direct
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScrapeOptions {
    pub executable: PathBuf,
    /// Query list fed to the scraper (one search per line).
    pub queries: PathBuf,
    pub geo: GeoArgs,
    pub depth: u32,
    pub exit_on_inactivity: String,
    pub launcher: Launcher,
    /// `None` waits forever.
    pub timeout: Option<Duration>,
    pub extra_args: Vec<String>,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(SCRAPER_BIN),
            queries: PathBuf::from(SCRAPER_QUERIES_FILE),
            geo: GeoArgs::default(),
            depth: SCRAPE_DEPTH,
            exit_on_inactivity: s!(SCRAPE_EXIT_ON_INACTIVITY),
            launcher: Launcher::for_platform(),
            timeout: None,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FallbackOptions {
    pub endpoint: String,
    pub engine: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    /// Pause after each lookup, per worker.
    pub pause: Duration,
}

impl Default for FallbackOptions {
    fn default() -> Self {
        Self {
            endpoint: s!(SERPAPI_ENDPOINT),
            engine: s!(SERPAPI_ENGINE),
            api_key: None,
            timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
            pause: Duration::from_millis(REQUEST_PAUSE_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn env_overrides_apply() {
        let mut opts = PipelineOptions::default();
        opts.apply_env(env(&[
            (ENV_SCRAPER_BIN, "/opt/gmaps"),
            (ENV_GEO, "-31.95, 115.86"),
            (ENV_ZOOM, "12"),
            (ENV_TIMEOUT_SECS, "600"),
            (ENV_WORKERS, "2"),
            (ENV_SERP_API_KEY, " secret "),
        ]));
        assert_eq!(opts.scrape.executable, PathBuf::from("/opt/gmaps"));
        assert_eq!(opts.scrape.geo.center(), "-31.95,115.86");
        assert_eq!(opts.scrape.geo.zoom, 12);
        assert_eq!(opts.scrape.timeout, Some(Duration::from_secs(600)));
        assert_eq!(opts.workers, 2);
        assert_eq!(opts.fallback.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn bad_env_values_keep_defaults() {
        let mut opts = PipelineOptions::default();
        opts.apply_env(env(&[
            (ENV_GEO, "north"),
            (ENV_ZOOM, "huge"),
            (ENV_WORKERS, "0"),
            (ENV_SERP_API_KEY, "   "),
        ]));
        assert_eq!(opts, PipelineOptions::default());
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let mut opts = PipelineOptions::default();
        opts.scrape.timeout = Some(Duration::from_secs(5));
        opts.apply_env(env(&[(ENV_TIMEOUT_SECS, "0")]));
        assert_eq!(opts.scrape.timeout, None);
    }
}
