//! Detection and cache benchmarks.
#![allow(missing_docs)]

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use pii_redact::{Category, PatternCache, PatternLibrary, PatternSpec, Sensitivity};

fn bench_single_category(c: &mut Criterion) {
    let library = PatternLibrary::new(Arc::new(PatternCache::with_defaults()));
    let text = "Contact me at jane.doe@corp.com or 555-123-4567 about MRN: 1234567";

    c.bench_function("detect_email_only", |b| {
        b.iter(|| {
            library.detect(
                black_box(text),
                Some(&[Category::Email]),
                Sensitivity::Medium,
                false,
            )
        });
    });
}

fn bench_all_categories(c: &mut Criterion) {
    let library = PatternLibrary::new(Arc::new(PatternCache::with_defaults()));
    let text = "Contact me at jane.doe@corp.com or 555-123-4567 about MRN: 1234567";

    c.bench_function("detect_all_categories", |b| {
        b.iter(|| library.detect(black_box(text), None, Sensitivity::Medium, false));
    });
}

fn bench_document_sizes(c: &mut Criterion) {
    let library = PatternLibrary::new(Arc::new(PatternCache::with_defaults()));
    let mut group = c.benchmark_group("detect_document_size");

    for kb in &[1usize, 8, 64] {
        let mut text = "filler text without anything sensitive in it. ".repeat(kb * 1024 / 47);
        text.push_str("needle@example.net");

        group.bench_with_input(BenchmarkId::from_parameter(kb), &text, |b, text| {
            b.iter(|| library.detect(black_box(text), None, Sensitivity::Medium, false));
        });
    }

    group.finish();
}

fn bench_cache_hit(c: &mut Criterion) {
    let cache = PatternCache::with_defaults();
    let spec = PatternSpec::new(r"\b\d{3}-\d{2}-\d{4}\b", Category::Ssn, 0.9);
    cache.get(&spec).unwrap();

    c.bench_function("cache_hit", |b| {
        b.iter(|| cache.get(black_box(&spec)));
    });
}

criterion_group!(
    benches,
    bench_single_category,
    bench_all_categories,
    bench_document_sizes,
    bench_cache_hit
);
criterion_main!(benches);
