// src/record.rs
//! Record shapes moving through the pipeline.
//!
//! - `PlaceRecord` / `Review`: what the scraper writes, one place per line.
//!   Every attribute is optional because scraper output is; validation happens
//!   in `schema`, not at decode time. Unknown keys ride along in `extra` so a
//!   read → write cycle does not drop scraper fields.
//! - `DealershipBatchItem` / `BatchReview`: the validated projection handed
//!   downstream. Built only by `schema::build_batch`.
//! - `Month` / `MonthSpec`: month selection for review filtering.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::SchemaError;

/* ---------------- Raw scraper records ---------------- */

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_rating: Option<f64>,
    /// Star ("1".."5") → count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews_per_rating: Option<BTreeMap<String, u64>>,
    #[serde(
        rename = "user_reviews_extended",
        alias = "reviews_extended",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reviews_extended: Option<Vec<Review>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlaceRecord {
    /// Key used for fallback lookups: `data_id`, then `place_id`.
    pub fn identifier(&self) -> Option<&str> {
        [self.data_id.as_deref(), self.place_id.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|id| !id.is_empty())
    }

    /// True when the scrape produced no review list, or an empty one.
    pub fn missing_reviews(&self) -> bool {
        self.reviews_extended.as_ref().is_none_or(|r| r.is_empty())
    }

    pub fn reviews(&self) -> &[Review] {
        self.reviews_extended.as_deref().unwrap_or(&[])
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("<untitled>")
    }

    /// Present attributes under their canonical names.
    pub fn fields(&self) -> Map<String, Value> {
        let mut m = Map::new();
        put(&mut m, "title", &self.title);
        put(&mut m, "categories", &self.categories);
        put(&mut m, "review_count", &self.review_count);
        put(&mut m, "review_rating", &self.review_rating);
        put(&mut m, "reviews_per_rating", &self.reviews_per_rating);
        if let Some(reviews) = &self.reviews_extended {
            let list = reviews.iter().map(|r| Value::Object(r.fields())).collect();
            m.insert(s!("reviews_extended"), Value::Array(list));
        }
        put(&mut m, "data_id", &self.data_id);
        put(&mut m, "place_id", &self.place_id);
        put(&mut m, "link", &self.link);
        m
    }

    /// Compact JSON for error messages.
    pub fn to_context(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(rename = "Name", alias = "name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        rename = "Rating",
        alias = "rating",
        default,
        deserialize_with = "de_rating",
        skip_serializing_if = "Option::is_none"
    )]
    pub rating: Option<u8>,
    #[serde(
        rename = "Description",
        alias = "description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    /// `YYYY-M-D`, `YYYY-MM-DD`, or anything else the source produced.
    #[serde(rename = "When", alias = "when", default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Review {
    /// Month component of `when`: second `-`-separated segment.
    /// `None` for missing dates, single-segment dates, or a non-numeric month.
    pub fn month(&self) -> Option<u32> {
        let when = self.when.as_deref()?;
        let mut parts = when.split('-');
        let _year = parts.next()?;
        parts.next()?.trim().parse::<u32>().ok()
    }

    pub fn fields(&self) -> Map<String, Value> {
        let mut m = Map::new();
        put(&mut m, "name", &self.name);
        put(&mut m, "rating", &self.rating);
        put(&mut m, "description", &self.description);
        put(&mut m, "when", &self.when);
        m
    }

    pub fn to_context(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

fn put<T: Serialize>(m: &mut Map<String, Value>, key: &str, v: &Option<T>) {
    if let Some(v) = v {
        if let Ok(value) = serde_json::to_value(v) {
            m.insert(s!(key), value);
        }
    }
}

/// Valid star ratings.
pub const RATING_RANGE: RangeInclusive<u8> = 1..=5;

/// Round a raw rating to whole stars. `None` for values that are not a
/// number or do not fit a `u8`; the 1-5 range is checked by `schema`.
pub fn normalize_rating(raw: f64) -> Option<u8> {
    let r = raw.round();
    (r.is_finite() && (0.0..=f64::from(u8::MAX)).contains(&r)).then_some(r as u8)
}

// Ratings show up as 5 or 5.0 depending on the source.
fn de_rating<'de, D>(de: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(de)?;
    Ok(raw.and_then(normalize_rating))
}

/* ---------------- Canonical batch ---------------- */

/// One dealership, validated and trimmed for summarization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DealershipBatchItem {
    pub title: String,
    pub review_count: u64,
    pub review_rating: f64,
    pub reviews_per_rating: BTreeMap<String, u64>,
    pub reviews_extended: Vec<BatchReview>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReview {
    pub rating: u8,
    pub description: String,
}

/* ---------------- Month selection ---------------- */

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month(u32);

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

impl Month {
    pub fn new(m: u32) -> Result<Self, SchemaError> {
        if (1..=12).contains(&m) {
            Ok(Month(m))
        } else {
            Err(SchemaError::InvalidMonth { got: m.to_string() })
        }
    }

    pub fn number(self) -> u32 {
        self.0
    }

    pub fn name(self) -> &'static str {
        MONTH_NAMES[(self.0 - 1) as usize]
    }

    pub fn of(date: NaiveDate) -> Self {
        Month(date.month())
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Month {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SchemaError::InvalidMonth { got: s.to_string() };
        let n: i64 = s.trim().parse().map_err(|_| invalid())?;
        u32::try_from(n).ok().and_then(|m| Month::new(m).ok()).ok_or_else(invalid)
    }
}

/// Anything a caller may pass as a month: a `Month`, an integer, or a numeric string.
pub trait IntoMonth {
    fn into_month(self) -> Result<Month, SchemaError>;
}

impl IntoMonth for Month {
    fn into_month(self) -> Result<Month, SchemaError> {
        Ok(self)
    }
}

impl IntoMonth for i64 {
    fn into_month(self) -> Result<Month, SchemaError> {
        u32::try_from(self)
            .ok()
            .and_then(|m| Month::new(m).ok())
            .ok_or_else(|| SchemaError::InvalidMonth { got: self.to_string() })
    }
}

impl IntoMonth for i32 {
    fn into_month(self) -> Result<Month, SchemaError> {
        i64::from(self).into_month()
    }
}

impl IntoMonth for u32 {
    fn into_month(self) -> Result<Month, SchemaError> {
        Month::new(self)
    }
}

impl IntoMonth for &str {
    fn into_month(self) -> Result<Month, SchemaError> {
        self.parse()
    }
}

impl IntoMonth for &String {
    fn into_month(self) -> Result<Month, SchemaError> {
        self.parse()
    }
}

/// Month as given at the pipeline entry: a fixed month or "current".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MonthSpec {
    #[default]
    Current,
    Fixed(Month),
}

impl MonthSpec {
    pub fn resolve(self, today: NaiveDate) -> Month {
        match self {
            MonthSpec::Current => Month::of(today),
            MonthSpec::Fixed(m) => m,
        }
    }
}

impl FromStr for MonthSpec {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("current") {
            Ok(MonthSpec::Current)
        } else {
            s.parse().map(MonthSpec::Fixed)
        }
    }
}
