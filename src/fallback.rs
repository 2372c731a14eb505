// src/fallback.rs
//! Secondary review lookup for places the scraper returned without reviews.
//!
//! The lookup service speaks its own schema (`user.name`, `rating`, `snippet`,
//! `iso_date`); `remap_reviews` turns that into canonical `Review`s. "No
//! reviews" is a normal answer and comes back as an empty list.

use serde::Deserialize;
use serde_json::Value;

use crate::config::FallbackOptions;
use crate::core::net::{self, NetError};
use crate::error::FetchError;
use crate::record::{Review, normalize_rating};

pub trait ReviewFetcher: Sync {
    fn fetch_reviews(&self, identifier: &str) -> Result<Vec<Review>, FetchError>;
}

/// SerpApi `google_maps_reviews` engine over blocking reqwest.
pub struct SerpApiFetcher {
    client: reqwest::blocking::Client,
    opts: FallbackOptions,
}

impl SerpApiFetcher {
    pub fn new(opts: FallbackOptions) -> Result<Self, FetchError> {
        let client = net::client(opts.timeout).map_err(FetchError::Client)?;
        Ok(Self { client, opts })
    }

    pub fn has_api_key(&self) -> bool {
        self.opts.api_key.is_some()
    }
}

impl ReviewFetcher for SerpApiFetcher {
    fn fetch_reviews(&self, identifier: &str) -> Result<Vec<Review>, FetchError> {
        let api_key = self.opts.api_key.as_deref().ok_or(FetchError::MissingApiKey)?;
        let query = [
            ("engine", self.opts.engine.as_str()),
            (id_param(identifier), identifier),
            ("api_key", api_key),
        ];

        logd!("Fallback: GET reviews id={identifier}");
        let body = net::get_json(&self.client, &self.opts.endpoint, &query).map_err(|e| match e {
            NetError::Transport(source) => FetchError::Http { identifier: s!(identifier), source },
            NetError::Status(status) => FetchError::Status { identifier: s!(identifier), status },
        })?;

        let reviews = remap_reviews(identifier, body)?;
        if reviews.is_empty() {
            logf!("Fallback: No reviews id={identifier}");
        }
        Ok(reviews)
    }
}

/// Map ids look like `0x6b9c...:0x1001...`; anything else is a place id.
pub fn id_param(identifier: &str) -> &'static str {
    let looks_like_data_id = identifier
        .split_once(':')
        .is_some_and(|(a, b)| a.starts_with("0x") && b.starts_with("0x"));
    if looks_like_data_id { "data_id" } else { "place_id" }
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    reviews: Vec<ApiReview>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ApiReview {
    #[serde(default)]
    user: Option<ApiUser>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    extracted_snippet: Option<ApiSnippet>,
    #[serde(default)]
    iso_date: Option<String>,
}

#[derive(Deserialize)]
struct ApiUser {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct ApiSnippet {
    #[serde(default)]
    original: Option<String>,
}

/// Lookup-service body → canonical reviews.
pub fn remap_reviews(identifier: &str, body: Value) -> Result<Vec<Review>, FetchError> {
    let resp: ApiResponse = serde_json::from_value(body)
        .map_err(|source| FetchError::Decode { identifier: s!(identifier), source })?;

    if let Some(message) = resp.error {
        // The service reports "no results" as an error string.
        if message.to_ascii_lowercase().contains("hasn't returned any results") {
            return Ok(Vec::new());
        }
        return Err(FetchError::Api { identifier: s!(identifier), message });
    }

    Ok(resp.reviews.into_iter().map(ApiReview::into_review).collect())
}

impl ApiReview {
    fn into_review(self) -> Review {
        let description = self
            .snippet
            .or_else(|| self.extracted_snippet.and_then(|s| s.original))
            .unwrap_or_default();
        // Keep the calendar date so month filtering sees YYYY-MM-DD.
        let when = self
            .iso_date
            .map(|d| d.split_once('T').map_or(d.clone(), |(date, _)| s!(date)));

        Review {
            name: self.user.and_then(|u| u.name),
            rating: self.rating.and_then(normalize_rating),
            description: Some(description),
            when,
            extra: Default::default(),
        }
    }
}
