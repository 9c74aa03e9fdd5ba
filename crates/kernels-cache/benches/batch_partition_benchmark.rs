//! Benchmarks batch partitioning and a full add/build/get cycle.
//!
//! The compiler here returns immediately, so the numbers measure the cache's own
//! bookkeeping: hashing, queueing, grouping and publishing.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use kernels_cache::{
    Batch, BatchGroup, BatchLimits, CompileError, CompiledProgram, InlineExecutor, KernelHandle, KernelSource, KernelsCache, KernelsCacheConfig, PendingKernel, partition
};

const OPTIONS: [&str; 3] = ["-cl-mad-enable", "-cl-fast-relaxed-math", ""];

fn sources(count: usize) -> Vec<Arc<KernelSource>> {
    (0..count)
        .map(|i| {
            let entry = format!("kernel_{i}");
            let code = format!("__kernel void {entry}(__global float* out) {{ out[get_global_id(0)] = {i}.0f; }}\n");
            Arc::new(KernelSource::new(code, OPTIONS[i % OPTIONS.len()], entry))
        })
        .collect()
}

fn compile_nothing(_target: &str, batch: &Batch) -> Result<CompiledProgram, CompileError> {
    Ok(batch
        .entry_points()
        .map(|ep| (ep.to_owned(), Arc::new(()) as KernelHandle))
        .collect())
}

fn benchmark_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_partition");
    for count in [64usize, 512, 4096] {
        let pending: Vec<PendingKernel> = sources(count)
            .into_iter()
            .map(|s| PendingKernel::new(s, BatchGroup::Shared))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(count), &pending, |b, pending| {
            b.iter(|| black_box(partition(pending.clone(), BatchLimits::new(8, 1 << 20))))
        });
    }
    group.finish();
}

fn benchmark_build_cycle(c: &mut Criterion) {
    let srcs = sources(512);
    c.bench_function("add_build_get_512", |b| {
        b.iter(|| {
            let cache = KernelsCache::with_executor(KernelsCacheConfig::default(), Arc::new(compile_nothing), Arc::new(InlineExecutor)).unwrap();
            cache.add_kernels_source("bench", srcs.iter().cloned(), false);
            cache.build_all().unwrap();
            black_box(cache.get_kernels("bench").unwrap());
        })
    });
}

criterion_group!(benches, benchmark_partition, benchmark_build_cycle);
criterion_main!(benches);
