//! 到期选择与状态分类基准测试

use chrono::{Duration as ChronoDuration, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use endpoint_vitals::endpoint::{Endpoint, NewEndpoint};
use endpoint_vitals::error::ProbeError;
use endpoint_vitals::health::{classify, select_due, ProbeOutcome};
use std::hint::black_box;
use std::time::Duration;

fn build_endpoints(count: usize) -> Vec<Endpoint> {
    let now = Utc::now();
    (0..count)
        .map(|i| {
            let endpoint = NewEndpoint::new(
                format!("svc-{}", i),
                format!("https://svc-{}.example.com/health", i),
                60 + (i as i64 % 10) * 30,
            )
            .validate()
            .expect("valid endpoint");

            // 一半从未检测，一半在不同时间检测过
            if i % 2 == 0 {
                endpoint
            } else {
                endpoint.with_last_checked(now - ChronoDuration::seconds((i % 400) as i64))
            }
        })
        .collect()
}

fn due_selection_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_due");
    for count in [100usize, 1_000, 10_000] {
        let endpoints = build_endpoints(count);
        let now = Utc::now();
        group.bench_with_input(BenchmarkId::from_parameter(count), &endpoints, |b, endpoints| {
            b.iter(|| black_box(select_due(black_box(endpoints), now)));
        });
    }
    group.finish();
}

fn classify_benchmark(c: &mut Criterion) {
    let outcomes = vec![
        ProbeOutcome::Response {
            status_code: 200,
            latency: Duration::from_millis(120),
        },
        ProbeOutcome::Response {
            status_code: 503,
            latency: Duration::from_millis(40),
        },
        ProbeOutcome::Response {
            status_code: 418,
            latency: Duration::from_millis(5),
        },
        ProbeOutcome::Failed {
            latency: Duration::from_secs(10),
            error: ProbeError::Timeout,
        },
    ];

    c.bench_function("classify_outcomes", |b| {
        b.iter(|| {
            for outcome in &outcomes {
                black_box(classify(black_box(outcome)));
            }
        });
    });
}

criterion_group!(benches, due_selection_benchmark, classify_benchmark);
criterion_main!(benches);
