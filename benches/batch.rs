// benches/batch.rs
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde_json::json;

use dealer_scrape::record::PlaceRecord;
use dealer_scrape::schema;

// Synthetic scrape: 200 places, two thirds dealers, 60 reviews each spread over the year.
fn sample() -> Vec<PlaceRecord> {
    (0..200)
        .map(|i| {
            let category = if i % 3 == 0 { "Cafe" } else { "Car dealer" };
            let reviews: Vec<_> = (0..60)
                .map(|r| json!({
                    "Name": format!("reviewer {r}"),
                    "Rating": 1 + r % 5,
                    "Description": "Friendly staff, slow paperwork, would return.",
                    "When": format!("2024-{}-{}", 1 + r % 12, 1 + r % 28),
                }))
                .collect();
            serde_json::from_value(json!({
                "title": format!("Place {i}"),
                "categories": [category],
                "review_count": 60,
                "review_rating": 4.1,
                "reviews_per_rating": { "1": 12, "2": 12, "3": 12, "4": 12, "5": 12 },
                "data_id": format!("0x{i:x}:0x1"),
                "user_reviews_extended": reviews,
            }))
            .expect("sample record")
        })
        .collect()
}

fn bench_batch(c: &mut Criterion) {
    let records = sample();

    c.bench_function("build_batch_month", |b| {
        b.iter(|| {
            let batch = schema::build_batch(black_box(&records), 3i32).expect("batch");
            black_box(batch.len())
        })
    });

    c.bench_function("filter_dealerships", |b| {
        b.iter(|| {
            let kept = schema::filter_dealerships(black_box(&records)).expect("categories");
            black_box(kept.len())
        })
    });
}

criterion_group!(benches, bench_batch);
criterion_main!(benches);
