mod common;

use std::{
    sync::{Arc, Barrier}, thread
};

use common::{MockBinary, RecordingCompiler, add_kernel_source, ids};
use kernels_cache::{InlineExecutor, KernelSource, KernelsCache, KernelsCacheConfig, KernelsCacheError};

fn cache_with(compiler: Arc<RecordingCompiler>, max_kernels: usize) -> KernelsCache {
    KernelsCache::new(
        KernelsCacheConfig::default()
            .with_streams(2)
            .with_max_kernels_per_batch(max_kernels),
        compiler,
    )
    .expect("cache")
}

#[test]
fn shared_source_compiles_once() {
    let compiler = Arc::new(RecordingCompiler::new());
    let cache = cache_with(compiler.clone(), 8);

    let first = cache.add_kernels_source("first", [add_kernel_source(0)], false);
    let second = cache.add_kernels_source("second", [add_kernel_source(0)], false);
    assert_eq!(first.queued, 1);
    assert_eq!(second.folded, 1);

    cache.build_all().expect("build");
    assert_eq!(compiler.invocations(), 1);

    let a = cache.get_kernels("first").expect("first");
    let b = cache.get_kernels("second").expect("second");
    assert!(a[0].same_instance(&b[0]));

    // Added after the build: served from the cache.
    let third = cache.add_kernels_source("third", [add_kernel_source(0)], false);
    assert_eq!(third.cached, 1);
    cache.build_all().expect("rebuild");
    assert_eq!(compiler.invocations(), 1);
    assert_eq!(cache.stats().cache_hits, 1);
}

#[test]
fn failing_batch_is_isolated() {
    let compiler = Arc::new(RecordingCompiler::new().failing_on("add_kernel_5"));
    let cache = cache_with(compiler.clone(), 3);
    cache.add_kernels_source("good", (0..3).map(add_kernel_source), false);
    cache.add_kernels_source("bad", (3..6).map(add_kernel_source), false);
    cache.add_kernels_source("also_good", (6..9).map(add_kernel_source), false);

    let err = cache.build_all().unwrap_err();
    let failures = err.compile_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].entry_points, ["add_kernel_3", "add_kernel_4", "add_kernel_5"]);
    assert!(failures[0].diagnostics.contains("does not compile"));
    assert_eq!(compiler.invocations(), 3);

    assert_eq!(ids(&cache.get_kernels("good").expect("good")), ["add_kernel_0", "add_kernel_1", "add_kernel_2"]);
    assert_eq!(cache.get_kernels("also_good").expect("also good").len(), 3);
    assert!(matches!(
        cache.get_kernels("bad"),
        Err(KernelsCacheError::UnresolvedKernel { .. })
    ));

    let stats = cache.stats();
    assert_eq!(stats.batches_compiled, 2);
    assert_eq!(stats.batches_failed, 1);
}

#[test]
fn failed_kernels_can_be_resubmitted() {
    let broken = Arc::new(RecordingCompiler::new().failing_on("add_kernel_1"));
    let cache = cache_with(broken, 8);
    cache.add_kernels_source("node", (0..2).map(add_kernel_source), false);
    assert!(cache.build_all().is_err());
    assert_eq!(cache.pending_len(), 0);

    // Nothing was cached, so adding again queues both units once more.
    let summary = cache.add_kernels_source("retry", (0..2).map(add_kernel_source), false);
    assert_eq!(summary.queued, 2);
}

#[test]
fn lookup_before_build_is_unresolved() {
    let cache = cache_with(Arc::new(RecordingCompiler::new()), 8);
    cache.add_kernels_source("node", [add_kernel_source(0)], false);
    match cache.get_kernels("node") {
        Err(KernelsCacheError::UnresolvedKernel { request, key }) => {
            assert_eq!(request.as_str(), "node");
            assert_eq!(key, add_kernel_source(0).key());
        }
        other => panic!("expected unresolved kernel, got {other:?}"),
    }
}

#[test]
fn force_new_batch_keeps_sources_apart() {
    let compiler = Arc::new(RecordingCompiler::new());
    let cache = KernelsCache::with_executor(KernelsCacheConfig::default(), compiler.clone(), Arc::new(InlineExecutor)).expect("cache");

    cache.add_kernels_source("shared_a", [add_kernel_source(0)], false);
    cache.add_kernels_source("private", (1..3).map(add_kernel_source), true);
    cache.add_kernels_source("shared_b", [add_kernel_source(3)], false);

    let report = cache.build_all().expect("build");
    assert_eq!(report.batches, 2);
    assert_eq!(
        compiler.batches(),
        vec![
            vec!["add_kernel_0".to_string(), "add_kernel_3".to_string()],
            vec!["add_kernel_1".to_string(), "add_kernel_2".to_string()],
        ]
    );
}

#[test]
fn isolated_sources_get_their_own_batch() {
    let compiler = Arc::new(RecordingCompiler::new());
    let cache = KernelsCache::with_executor(KernelsCacheConfig::default(), compiler.clone(), Arc::new(InlineExecutor)).expect("cache");

    cache.add_kernels_source(
        "node",
        [add_kernel_source(0), add_kernel_source(1).isolated(), add_kernel_source(2)],
        false,
    );
    cache.build_all().expect("build");
    assert_eq!(compiler.batches().len(), 2);
    assert_eq!(ids(&cache.get_kernels("node").expect("kernels")), ["add_kernel_0", "add_kernel_1", "add_kernel_2"]);
}

#[test]
fn concurrent_adds_then_one_build() {
    let compiler = Arc::new(RecordingCompiler::new());
    let cache = Arc::new(cache_with(compiler.clone(), 4));
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|node| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                // Every node shares kernel 0 and owns one more.
                cache.add_kernels_source(node as u64, [add_kernel_source(0), add_kernel_source(node + 1)], false);
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("add thread");
    }

    let report = cache.build_all().expect("build");
    assert_eq!(report.kernels_compiled, 5);

    let shared = cache.get_kernels(0u64).expect("node 0")[0].clone();
    for node in 0..4u64 {
        let kernels = cache.get_kernels(node).expect("node kernels");
        assert_eq!(ids(&kernels), ["add_kernel_0".to_string(), format!("add_kernel_{}", node + 1)]);
        assert!(kernels[0].same_instance(&shared));
        assert_eq!(kernels[1].downcast_handle::<MockBinary>().map(|b| b.entry_point.as_str()), Some(kernels[1].id()));
    }
}

#[test]
fn different_build_options_are_different_kernels() {
    let compiler = Arc::new(RecordingCompiler::new());
    let cache = KernelsCache::with_executor(KernelsCacheConfig::default(), compiler.clone(), Arc::new(InlineExecutor)).expect("cache");
    let plain = add_kernel_source(0);
    let fast = KernelSource::new(plain.code.clone(), "-cl-fast-relaxed-math", plain.entry_point.clone());
    assert_ne!(plain.key(), fast.key());

    cache.add_kernels_source("plain", [plain], false);
    cache.add_kernels_source("fast", [fast], false);
    let report = cache.build_all().expect("build");
    assert_eq!(report.batches, 2);
    assert_eq!(report.kernels_compiled, 2);
}
