//! Commit log and storage backend benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use radixdb_bench::{entries, path_keys, rng};
use radixdb_core::log::{CommitLog, LogOp, LogRecord};
use radixdb_core::SequenceNumber;
use radixdb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use tempfile::TempDir;

fn batch(sequence: u64, size: usize, value_size: usize) -> LogRecord {
    let ops = entries(&mut rng(), path_keys(size), value_size)
        .into_iter()
        .map(|(key, value)| LogOp::Put { key, value })
        .collect();
    LogRecord::Batch {
        sequence: SequenceNumber::new(sequence),
        ops,
    }
}

/// Benchmark encoding and appending one batch record.
fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_append");

    for size in [1, 100, 1_000].iter() {
        let record = batch(1, *size, 64);
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("memory", size), &record, |b, record| {
            let mut log = CommitLog::new(Box::new(InMemoryBackend::new()));
            b.iter(|| black_box(log.append(record).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("file_flush", size), &record, |b, record| {
            let dir = TempDir::new().unwrap();
            let backend = FileBackend::open(&dir.path().join("bench.log")).unwrap();
            let mut log = CommitLog::new(Box::new(backend));
            b.iter(|| {
                log.append(record).unwrap();
                log.flush().unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark replaying a log into a fresh trie.
fn bench_recover(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_recover");
    group.sample_size(20);
    let dir = TempDir::new().unwrap();

    for records in [10u64, 100].iter() {
        let path = dir.path().join(format!("recover-{records}.log"));
        {
            let mut log = CommitLog::new(Box::new(FileBackend::open(&path).unwrap()));
            for sequence in 1..=*records {
                log.append(&batch(sequence, 100, 64)).unwrap();
            }
            log.sync().unwrap();
        }
        let bytes = std::fs::read(&path).unwrap();

        group.throughput(Throughput::Elements(*records));
        group.bench_with_input(BenchmarkId::from_parameter(records), &bytes, |b, bytes| {
            b.iter(|| {
                let backend = InMemoryBackend::with_data(bytes.clone());
                let mut log = CommitLog::new(Box::new(backend));
                black_box(log.recover().unwrap().data.len())
            });
        });
    }
    group.finish();
}

/// Benchmark raw backend appends underneath the log.
fn bench_backend_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("backend_append");

    for size in [64, 4096].iter() {
        let data = vec![0xa5u8; *size];
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("memory", size), &data, |b, data| {
            let mut backend = InMemoryBackend::new();
            b.iter(|| black_box(backend.append(data).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_append, bench_recover, bench_backend_append);
criterion_main!(benches);
