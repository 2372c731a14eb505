// src/schema.rs
//! Schema filter: raw place records → canonical dealership batch.
//!
//! Strict where the structure is wrong, lenient where only data is odd:
//! - a place without `categories`, or a dealership/review missing a required
//!   key, aborts the whole batch with the offending record attached;
//! - a review whose date cannot be read is quietly left out of month views.

use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::record::{DealershipBatchItem, IntoMonth, PlaceRecord, RATING_RANGE, Review};

/// Top-level keys every dealership must carry.
pub const DEALERSHIP_KEYS: [&str; 5] = [
    "title",
    "review_count",
    "review_rating",
    "reviews_per_rating",
    "reviews_extended",
];

/// Keys kept on each review handed downstream.
pub const REVIEW_KEYS: [&str; 2] = ["rating", "description"];

const DEALER_MARKER: &str = "dealer";

/// Keep places with a category containing "dealer" (any case).
/// A place with no `categories` at all is an error, not a non-dealer.
pub fn filter_dealerships(records: &[PlaceRecord]) -> Result<Vec<&PlaceRecord>, SchemaError> {
    let mut out = Vec::new();
    for rec in records {
        let categories = rec
            .categories
            .as_ref()
            .ok_or_else(|| SchemaError::MissingCategories { record: rec.to_context() })?;
        if categories.iter().any(|c| c.to_lowercase().contains(DEALER_MARKER)) {
            out.push(rec);
        }
    }
    Ok(out)
}

/// Reviews dated in `month`. Undated or unreadable dates are skipped.
pub fn filter_reviews_by_month<M: IntoMonth>(
    reviews: &[Review],
    month: M,
) -> Result<Vec<&Review>, SchemaError> {
    let month = month.into_month()?;
    Ok(reviews.iter().filter(|r| r.month() == Some(month.number())).collect())
}

/// Exactly `keys` out of `record`, or every missing key at once.
pub fn project_keys(record: &Map<String, Value>, keys: &[&str]) -> Result<Map<String, Value>, SchemaError> {
    let missing: Vec<String> = keys
        .iter()
        .filter(|k| !record.contains_key(**k))
        .map(|k| s!(*k))
        .collect();
    if !missing.is_empty() {
        let context = serde_json::to_string(record).unwrap_or_default();
        return Err(SchemaError::MissingField { missing, record: context });
    }

    Ok(keys
        .iter()
        .filter_map(|k| record.get(*k).map(|v| (s!(*k), v.clone())))
        .collect())
}

/// Everything in `record` except `keys`.
pub fn filter_out_keys(record: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    record
        .iter()
        .filter(|(k, _)| !keys.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Dealerships only, required keys only, reviews for `month` only,
/// and each review reduced to `{rating, description}`.
pub fn build_batch<M: IntoMonth>(
    records: &[PlaceRecord],
    month: M,
) -> Result<Vec<DealershipBatchItem>, SchemaError> {
    let month = month.into_month()?;
    let dealers = filter_dealerships(records)?;

    let mut batch = Vec::with_capacity(dealers.len());
    for place in dealers {
        let mut item = project_keys(&place.fields(), &DEALERSHIP_KEYS)?;

        let reviews = filter_reviews_by_month(place.reviews(), month)?
            .into_iter()
            .map(|r| {
                check_rating(r)?;
                project_keys(&r.fields(), &REVIEW_KEYS).map(Value::Object)
            })
            .collect::<Result<Vec<_>, _>>()?;
        item.insert(s!("reviews_extended"), Value::Array(reviews));

        batch.push(serde_json::from_value(Value::Object(item))?);
    }

    logd!("Schema: Batch month={month} places={} dealerships={}", records.len(), batch.len());
    Ok(batch)
}

fn check_rating(review: &Review) -> Result<(), SchemaError> {
    match review.rating {
        Some(rating) if !RATING_RANGE.contains(&rating) => {
            Err(SchemaError::InvalidRating { rating, record: review.to_context() })
        }
        _ => Ok(()),
    }
}
