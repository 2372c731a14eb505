// tests/schema_filter.rs
use serde_json::json;

use dealer_scrape::error::SchemaError;
use dealer_scrape::record::{BatchReview, Month, PlaceRecord, Review};
use dealer_scrape::schema::{build_batch, filter_dealerships, filter_reviews_by_month};

fn parse(v: serde_json::Value) -> PlaceRecord {
    serde_json::from_value(v).unwrap()
}

fn review(when: &str) -> Review {
    Review { when: Some(when.into()), rating: Some(4), description: Some(when.into()), ..Default::default() }
}

#[test]
fn month_filter_matches_only_that_month() {
    let reviews: Vec<Review> = (1..=12)
        .flat_map(|m| [review(&format!("2024-{m}-3")), review(&format!("2023-{m:02}-28"))])
        .chain(["2024", "2024-xx-1", "", "garbage"].map(review))
        .collect();

    for m in 1..=12u32 {
        let kept = filter_reviews_by_month(&reviews, m).unwrap();
        assert_eq!(kept.len(), 2, "month {m}");
        assert!(kept.iter().all(|r| r.month() == Some(m)));
    }
}

#[test]
fn month_accepts_numeric_strings() {
    let reviews = vec![review("2024-7-1"), review("2024-8-1")];
    assert_eq!(filter_reviews_by_month(&reviews, "7").unwrap().len(), 1);
    assert_eq!(filter_reviews_by_month(&reviews, Month::new(8).unwrap()).unwrap().len(), 1);
}

#[test]
fn out_of_range_or_text_month_is_rejected() {
    let reviews = vec![review("2024-7-1")];
    for bad in [0i32, 13, -4] {
        assert!(matches!(
            filter_reviews_by_month(&reviews, bad),
            Err(SchemaError::InvalidMonth { .. })
        ));
    }
    assert!(matches!(filter_reviews_by_month(&reviews, "abc"), Err(SchemaError::InvalidMonth { .. })));
    assert!(matches!(build_batch(&[], 13i32), Err(SchemaError::InvalidMonth { .. })));
}

#[test]
fn missing_categories_is_an_error_not_a_skip() {
    let records = vec![
        parse(json!({ "title": "A", "categories": ["Car dealer"] })),
        parse(json!({ "title": "Nameless place" })),
    ];
    match filter_dealerships(&records) {
        Err(SchemaError::MissingCategories { record }) => assert!(record.contains("Nameless place")),
        other => panic!("expected MissingCategories, got {other:?}"),
    }
}

#[test]
fn empty_input_passes_through() {
    assert!(filter_dealerships(&[]).unwrap().is_empty());
    assert!(build_batch(&[], 5i32).unwrap().is_empty());
}

#[test]
fn dealer_with_march_review_survives_cafe_does_not() {
    let records = vec![
        parse(json!({
            "title": "A Dealer",
            "categories": ["car dealer"],
            "review_count": 2,
            "review_rating": 4.5,
            "reviews_per_rating": { "4": 1, "5": 1 },
            "reviews_extended": [
                { "Name": "Jo", "Rating": 5, "Description": "Great", "When": "2024-3-14" },
                { "Name": "Al", "Rating": 4, "Description": "Fine", "When": "2024-4-02" }
            ]
        })),
        parse(json!({ "title": "B", "categories": ["cafe"] })),
    ];

    let batch = build_batch(&records, 3i32).unwrap();
    assert_eq!(batch.len(), 1);
    let item = &batch[0];
    assert_eq!(item.title, "A Dealer");
    assert_eq!(item.review_count, 2);
    assert_eq!(item.reviews_per_rating.get("5"), Some(&1));
    assert_eq!(item.reviews_extended, vec![BatchReview { rating: 5, description: "Great".into() }]);
}

#[test]
fn batch_item_serializes_to_exactly_the_canonical_keys() {
    let records = vec![parse(json!({
        "title": "A Dealer",
        "categories": ["Used car dealer"],
        "review_count": 1,
        "review_rating": 5.0,
        "reviews_per_rating": { "5": 1 },
        "link": "https://maps.example/a",
        "data_id": "0x1:0x2",
        "user_reviews_extended": [{ "Name": "Jo", "Rating": 5, "Description": "", "When": "2024-3-1" }]
    }))];

    let batch = build_batch(&records, 3i32).unwrap();
    let value = serde_json::to_value(&batch[0]).unwrap();
    let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, ["review_count", "review_rating", "reviews_extended", "reviews_per_rating", "title"]);
    assert_eq!(value["reviews_extended"], json!([{ "rating": 5, "description": "" }]));
}

#[test]
fn dealer_missing_required_keys_aborts_batch() {
    let records = vec![parse(json!({ "title": "A Dealer", "categories": ["car dealer"], "review_count": 3 }))];
    match build_batch(&records, 3i32) {
        Err(SchemaError::MissingField { missing, record }) => {
            assert_eq!(missing, vec!["review_rating", "reviews_per_rating", "reviews_extended"]);
            assert!(record.contains("A Dealer"));
        }
        other => panic!("expected MissingField, got {other:?}"),
    }
}

#[test]
fn review_missing_rating_aborts_batch() {
    let records = vec![parse(json!({
        "title": "A Dealer",
        "categories": ["car dealer"],
        "review_count": 1,
        "review_rating": 4.0,
        "reviews_per_rating": {},
        "reviews_extended": [{ "Description": "no stars given", "When": "2024-3-1" }]
    }))];
    match build_batch(&records, 3i32) {
        Err(SchemaError::MissingField { missing, .. }) => assert_eq!(missing, vec!["rating"]),
        other => panic!("expected MissingField, got {other:?}"),
    }
}

#[test]
fn reviews_outside_month_do_not_need_to_be_complete() {
    let records = vec![parse(json!({
        "title": "A Dealer",
        "categories": ["car dealer"],
        "review_count": 1,
        "review_rating": 4.0,
        "reviews_per_rating": {},
        "reviews_extended": [{ "Description": "no stars given", "When": "2024-5-1" }]
    }))];
    let batch = build_batch(&records, 3i32).unwrap();
    assert!(batch[0].reviews_extended.is_empty());
}

#[test]
fn out_of_range_rating_in_month_aborts_batch() {
    let records = vec![parse(json!({
        "title": "A Dealer",
        "categories": ["car dealer"],
        "review_count": 2,
        "review_rating": 4.0,
        "reviews_per_rating": {},
        "reviews_extended": [
            { "Rating": 7, "Description": "seven stars", "When": "2024-3-1" },
            { "Rating": 0, "Description": "zero stars", "When": "2024-6-1" }
        ]
    }))];
    match build_batch(&records, 3i32) {
        Err(SchemaError::InvalidRating { rating, record }) => {
            assert_eq!(rating, 7);
            assert!(record.contains("seven stars"));
        }
        other => panic!("expected InvalidRating, got {other:?}"),
    }
    // reviews outside the month are not checked
    assert!(build_batch(&records, 5i32).unwrap()[0].reviews_extended.is_empty());
}
