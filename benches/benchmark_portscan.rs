use criterion::{criterion_group, criterion_main, Criterion};
use rangescan::address::Address;
use rangescan::controller::{CancelSignal, RunController};
use rangescan::input::ScanConfig;
use rangescan::scanner::Scanner;
use std::hint::black_box;
use std::time::Duration;

fn bench_address_walk(c: &mut Criterion) {
    let start: Address = "10.0.0.0".parse().unwrap();

    c.bench_function("increment 65536 addresses", |b| {
        b.iter(|| {
            let mut host = start;
            for _ in 0..65_535 {
                host = host.increment().unwrap();
            }
            black_box(host)
        });
    });
}

fn bench_port_windows(c: &mut Criterion) {
    let config = ScanConfig::new("127.0.0.1", "127.0.0.1", 1, u16::MAX, 300, 500, false).unwrap();
    let strategy = config.port_strategy();

    c.bench_function("partition 65535 ports into windows", |b| {
        b.iter(|| black_box(strategy.windows().map(|window| window.len()).sum::<usize>()));
    });
}

fn bench_localhost_scan(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let config = ScanConfig::new("127.0.0.1", "127.0.0.2", 1, 1_000, 50, 250, false).unwrap();
    let scanner = Scanner::new(config);

    let mut group = c.benchmark_group("localhost scan");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);
    group.bench_function("2 hosts x 1000 ports", |b| {
        b.iter(|| {
            black_box(runtime.block_on(RunController::new(&scanner, CancelSignal::new()).run()))
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_address_walk,
    bench_port_windows,
    bench_localhost_scan
);
criterion_main!(benches);
