// src/config/consts.rs

// Cache
pub const DEFAULT_CACHE_PATH: &str = "./cache_data/LDV_places.jsonl";
pub const BACKUP_TAG: &str = "_backup_";
pub const BACKUP_TIMESTAMP_FMT: &str = "%Y-%m-%d_%H-%M";

// Logging
pub const DEFAULT_LOG_FILE: &str = ".store/debug.log";

// External scraper
pub const SCRAPER_BIN: &str = "google-maps-scraper";
pub const SCRAPER_QUERIES_FILE: &str = "./cache_data/queries.txt";
pub const GEO_LAT: f64 = -33.8688; // New South Wales, around Sydney
pub const GEO_LON: f64 = 151.2093;
pub const GEO_ZOOM: u8 = 10;
pub const SCRAPE_DEPTH: u32 = 1;
pub const SCRAPE_EXIT_ON_INACTIVITY: &str = "3m";
pub const SCRAPE_POLL_MS: u64 = 100;
pub const SCRAPE_DRAIN_GRACE_MS: u64 = 2_000;

// Secondary review API
pub const SERPAPI_ENDPOINT: &str = "https://serpapi.com/search.json";
pub const SERPAPI_ENGINE: &str = "google_maps_reviews";
pub const HTTP_TIMEOUT_SECS: u64 = 30;
pub const USER_AGENT: &str = concat!("dealer_scrape/", env!("CARGO_PKG_VERSION"));

// Concurrency
pub const WORKERS: usize = 4;
pub const REQUEST_PAUSE_MS: u64 = 75; // be polite

// Env overrides
pub const ENV_SCRAPER_BIN: &str = "DEALER_SCRAPE_BIN";
pub const ENV_GEO: &str = "DEALER_SCRAPE_GEO";
pub const ENV_ZOOM: &str = "DEALER_SCRAPE_ZOOM";
pub const ENV_TIMEOUT_SECS: &str = "DEALER_SCRAPE_TIMEOUT_SECS";
pub const ENV_WORKERS: &str = "DEALER_SCRAPE_WORKERS";
pub const ENV_SERP_API_KEY: &str = "SERP_API_KEY";
