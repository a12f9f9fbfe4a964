use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::Barrier;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;

use governor::DefaultKeyedRateLimiter;
use governor::Quota;
use governor::RateLimiter;

use nicho_limit::Clock;
use nicho_limit::FixedWindow;
use nicho_limit::Strategy;
use nicho_limit::SystemClock;

const KEYS: usize = 1_024;

fn client_keys() -> Vec<String> {
    (0..KEYS)
        .map(|i| format!("10.{}.{}.{}", i >> 16, (i >> 8) & 0xff, i & 0xff))
        .collect()
}

fn bench_single_key(c: &mut Criterion, limiter: &FixedWindow) {
    let mut group = c.benchmark_group("FixedWindow-single-key");
    let now = SystemClock.now();

    group.bench_function("check", |b| {
        b.iter(|| {
            let _ = black_box(limiter.check(black_box("203.0.113.7"), now));
        })
    });
    group.bench_function("stats", |b| {
        b.iter(|| {
            let _ = black_box(limiter.stats(black_box("203.0.113.7")));
        })
    });

    group.finish();
}

fn bench_many_keys(c: &mut Criterion, limiter: &FixedWindow, governor: &DefaultKeyedRateLimiter<String>) {
    let mut group = c.benchmark_group("many-keys");
    let keys = client_keys();
    let now = SystemClock.now();

    group.bench_function("FixedWindow", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % KEYS;
            let _ = black_box(limiter.check(&keys[i], now));
        })
    });
    group.bench_function("Governor", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % KEYS;
            let _ = black_box(governor.check_key(&keys[i]));
        })
    });

    group.finish();
}

fn bench_parallel(c: &mut Criterion, limiter: Arc<FixedWindow>) {
    let mut group = c.benchmark_group("FixedWindow-parallel");
    let keys = Arc::new(client_keys());

    for threads in [2, 4, 8].iter() {
        let num_threads = *threads;
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}-threads", num_threads)),
            &num_threads,
            |b, &n| {
                b.iter_custom(|iters| {
                    let barrier = Arc::new(Barrier::new(n + 1));
                    let mut handles = Vec::with_capacity(n);

                    for t in 0..n {
                        let l = Arc::clone(&limiter);
                        let k = Arc::clone(&keys);
                        let bar = Arc::clone(&barrier);
                        let iters_per_thread = iters / n as u64;

                        handles.push(thread::spawn(move || {
                            let now = SystemClock.now();
                            bar.wait(); // Wait for the start signal
                            for i in 0..iters_per_thread {
                                let key = &k[(i as usize + t) % KEYS];
                                let _ = black_box(l.check(key, now));
                            }
                        }));
                    }

                    // Synchronize the start across all threads
                    barrier.wait();
                    let start = Instant::now();

                    for handle in handles {
                        let _ = handle.join();
                    }

                    start.elapsed()
                });
            },
        );
    }
    group.finish();
}

fn bench_cleanup(c: &mut Criterion) {
    let limit = NonZeroU32::new(100).unwrap();
    let keys = client_keys();

    c.bench_function("FixedWindow-cleanup-1024-expired", |b| {
        b.iter_batched(
            || {
                let limiter = FixedWindow::new(limit, Duration::from_millis(10));
                for key in &keys {
                    let _ = limiter.check(key, 0);
                }
                limiter
            },
            |limiter| black_box(limiter.cleanup(1_000)),
            criterion::BatchSize::SmallInput,
        )
    });
}

fn run_all_benches(c: &mut Criterion) {
    let limit_val = 1_000_000;
    let limit = NonZeroU32::new(limit_val).unwrap();
    let period = Duration::from_secs(60);

    let fw = Arc::new(FixedWindow::new(limit, period).with_name("bench"));
    let gov = RateLimiter::keyed(Quota::per_minute(limit));

    bench_single_key(c, &fw);
    bench_many_keys(c, &fw, &gov);
    bench_parallel(c, fw);
    bench_cleanup(c);
}

criterion_group!(benches, run_all_benches);
criterion_main!(benches);
