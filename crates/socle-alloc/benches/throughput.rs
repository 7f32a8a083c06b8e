use std::alloc::Layout;
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use socle_alloc::{BucketConfig, SegregatedAllocator};

const OPS: u64 = 100_000;

fn segregated_cycle(alloc: &SegregatedAllocator, size: usize) {
    for _ in 0..OPS {
        let block = alloc.allocate(size).unwrap();
        black_box(block);
        unsafe { alloc.deallocate(block, size) };
    }
}

fn system_cycle(size: usize) {
    let layout = Layout::from_size_align(size, 8).unwrap();
    for _ in 0..OPS {
        unsafe {
            let ptr = std::alloc::alloc(layout);
            black_box(ptr);
            std::alloc::dealloc(ptr, layout);
        }
    }
}

fn benchmark_alloc_throughput(c: &mut Criterion) {
    let config = BucketConfig::new(64, 65_536, 4).unwrap();
    let alloc = SegregatedAllocator::new(config);
    let mut group = c.benchmark_group("alloc_throughput");

    for size in [16usize, 64, 256, 1024, 4096, 65_536] {
        group.throughput(Throughput::Elements(OPS));

        group.bench_with_input(BenchmarkId::new("segregated", size), &size, |b, &size| {
            // Warm the bucket so the measurement sees the steady-state
            // lock-free path, not first-touch expansion.
            segregated_cycle(&alloc, size);
            b.iter(|| segregated_cycle(&alloc, size))
        });

        group.bench_with_input(BenchmarkId::new("system", size), &size, |b, &size| {
            b.iter(|| system_cycle(size))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_alloc_throughput);
criterion_main!(benches);
