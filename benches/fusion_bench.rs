//! Fusion and tokenizer benchmarks
//!
//! - **fuse**: merging two ten-hit candidate lists at varying overlap
//! - **extract_keywords**: short and long queries

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ticketrank::search::fusion::{fuse, FusionParams};
use ticketrank::search::tokenizer::{build_lexical_query, extract_keywords};
use ticketrank::types::IndexHit;

fn hits(start: i64, count: i64, base: f64) -> Vec<IndexHit> {
    (0..count)
        .map(|i| IndexHit {
            ticket_id: start + i,
            subject: format!("Subject {}", start + i),
            summary: format!("Summary of ticket {}", start + i),
            score: base / (1.0 + i as f64),
        })
        .collect()
}

fn bench_fuse(c: &mut Criterion) {
    let params = FusionParams::default();
    let mut group = c.benchmark_group("fuse");
    for overlap in [0_i64, 5, 10] {
        let semantic = hits(0, 10, 0.9);
        let lexical = hits(10 - overlap, 10, 0.05);
        group.bench_with_input(BenchmarkId::from_parameter(overlap), &overlap, |b, _| {
            b.iter(|| fuse(black_box(&semantic), black_box(&lexical), &params))
        });
    }
    group.finish();
}

fn bench_keywords(c: &mut Criterion) {
    let short = "Payment failed at checkout with error 402";
    let long = "Hello, since the update yesterday my VPN client disconnects every few \
                minutes and the dashboard shows an authentication timeout. I already \
                reinstalled the client and rebooted the laptop but it keeps happening.";
    c.bench_function("extract_keywords/short", |b| {
        b.iter(|| extract_keywords(black_box(short)))
    });
    c.bench_function("extract_keywords/long", |b| {
        b.iter(|| build_lexical_query(&extract_keywords(black_box(long))))
    });
}

criterion_group!(benches, bench_fuse, bench_keywords);
criterion_main!(benches);
