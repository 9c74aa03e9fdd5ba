mod common;

use std::{sync::Arc, time::Duration};

use common::{RecordingCompiler, add_kernel_source, ids};
use kernels_cache::{KernelsCache, KernelsCacheConfig};

#[test]
fn kernels_come_back_in_submission_order() {
    let compiler = Arc::new(RecordingCompiler::new().delaying_first_batch(Duration::from_millis(50)));
    let config = KernelsCacheConfig::default()
        .with_streams(2)
        .with_max_kernels_per_batch(4);
    let cache = KernelsCache::new(config, compiler.clone()).expect("cache");

    let sources: Vec<_> = (0..9).map(add_kernel_source).collect();
    let summary = cache.add_kernels_source(0u64, sources, false);
    assert_eq!(summary.queued, 9);

    let report = cache.build_all().expect("build");
    assert_eq!(report.batches, 3);
    assert_eq!(report.kernels_compiled, 9);
    assert_eq!(compiler.invocations(), 3);

    // Batch 0 was held back, so it cannot have finished first.
    let completion = compiler.batches();
    assert_ne!(completion[0][0], "add_kernel_0");

    let expected: Vec<String> = (0..9).map(|i| format!("add_kernel_{i}")).collect();
    assert_eq!(ids(&cache.get_kernels(0u64).expect("kernels")), expected);
}

#[test]
fn repeated_adds_append_to_the_request() {
    let compiler = Arc::new(RecordingCompiler::new());
    let cache = KernelsCache::new(KernelsCacheConfig::default().with_streams(2), compiler).expect("cache");

    cache.add_kernels_source("node", (0..5).map(add_kernel_source), false);
    cache.add_kernels_source("node", (5..9).map(add_kernel_source), false);
    cache.build_all().expect("build");

    let expected: Vec<String> = (0..9).map(|i| format!("add_kernel_{i}")).collect();
    assert_eq!(ids(&cache.get_kernels("node").expect("kernels")), expected);
}
