//! Benchmarks for mtwalk
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn benchmark_queue_operations(c: &mut Criterion) {
    use mtwalk::walker::queue::WorkQueue;

    c.bench_function("queue_send_recv", |b| {
        let queue: WorkQueue<String> = WorkQueue::new(10000);
        let sender = queue.sender();
        let receiver = queue.receiver();

        b.iter(|| {
            sender.try_send("/test/path".to_string()).unwrap();
            let received = receiver.try_recv().unwrap();
            black_box(received);
        })
    });
}

fn benchmark_buffer_typed_reads(c: &mut Criterion) {
    use mtwalk::buffer::PooledBuffer;

    c.bench_function("buffer_read_u64", |b| {
        let mut buffer = PooledBuffer::new(4096);
        for i in 0..512 {
            buffer.write_u64_at(i * 8, i as u64);
        }

        b.iter(|| {
            let mut sum = 0u64;
            for i in 0..512 {
                sum = sum.wrapping_add(buffer.read_u64_at(i * 8));
            }
            black_box(sum);
        })
    });
}

fn benchmark_wildcard_match(c: &mut Criterion) {
    use mtwalk::fs::wildcard_match;

    c.bench_function("wildcard_match", |b| {
        b.iter(|| {
            black_box(wildcard_match(
                black_box("*.tar.gz"),
                black_box("backup-2024-01-15-full.tar.gz"),
            ));
        })
    });
}

fn benchmark_small_tree_walk(c: &mut Criterion) {
    use mtwalk::config::WalkOptions;
    use mtwalk::walker::{NullMonitor, SummaryCollector, Traversal, WalkStats};
    use mtwalk::{NativeFileSystem, PathValue};
    use std::sync::Arc;

    let dir = tempfile::tempdir().unwrap();
    for i in 0..16 {
        let sub = dir.path().join(format!("d{}", i));
        std::fs::create_dir(&sub).unwrap();
        for j in 0..32 {
            std::fs::write(sub.join(format!("f{}", j)), b"x").unwrap();
        }
    }
    let root = PathValue::parse(dir.path().to_str().unwrap()).unwrap();

    c.bench_function("walk_small_tree", |b| {
        let options = WalkOptions {
            worker_count: 4,
            queue_capacity: 1024,
            follow_links: false,
            buffer_capacity: 64 << 10,
            show_progress: false,
            verbose: false,
        };
        let fs = NativeFileSystem::new(options.worker_count, options.buffer_capacity);
        let collector = SummaryCollector;

        b.iter(|| {
            let stats = Arc::new(WalkStats::default());
            let traversal =
                Traversal::new(&fs, &collector, &NullMonitor, options.clone(), stats);
            let (tree, _) = traversal.run(&root).unwrap();
            black_box(tree);
        })
    });
}

criterion_group!(
    benches,
    benchmark_queue_operations,
    benchmark_buffer_typed_reads,
    benchmark_wildcard_match,
    benchmark_small_tree_walk
);
criterion_main!(benches);
