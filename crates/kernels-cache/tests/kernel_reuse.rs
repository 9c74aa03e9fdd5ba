mod common;

use std::sync::Arc;

use common::RecordingCompiler;
use kernels_cache::{InlineExecutor, KernelSource, KernelsCache, KernelsCacheConfig};

const CONCAT: &str = "__kernel void concatenation_ref(__global const float* a, __global const float* b, __global float* out) {
    const int gid = get_global_id(0);
    out[gid] = gid < 16 ? a[gid] : b[gid - 16];
}
";

const CONV: &str = "__kernel void convolution_ref(__global const float* in, __global const float* w, __global float* out) {
    const int gid = get_global_id(0);
    out[gid] = in[gid] * w[0] + in[gid + 1] * w[1];
}
";

fn concat() -> KernelSource {
    KernelSource::new(CONCAT, "-cl-mad-enable", "concatenation_ref")
}

fn conv() -> KernelSource {
    KernelSource::new(CONV, "-cl-mad-enable", "convolution_ref")
}

/// Two structurally identical concat -> conv chains, one request per node.
fn add_subgraphs(cache: &KernelsCache) {
    for chain in ["a", "b"] {
        cache.add_kernels_source(format!("concat_{chain}"), [concat()], false);
        cache.add_kernels_source(format!("conv_{chain}"), [conv()], false);
    }
}

#[test]
fn identical_subgraphs_share_kernels() {
    let compiler = Arc::new(RecordingCompiler::new());
    let cache = KernelsCache::with_executor(KernelsCacheConfig::default(), compiler.clone(), Arc::new(InlineExecutor)).expect("cache");
    add_subgraphs(&cache);
    assert_eq!(cache.pending_len(), 2);

    let report = cache.build_all().expect("build");
    assert_eq!(report.kernels_compiled, 2);
    assert_eq!(compiler.invocations(), 1);

    for node in ["concat", "conv"] {
        let a = cache.get_kernels(format!("{node}_a")).expect("first chain");
        let b = cache.get_kernels(format!("{node}_b")).expect("second chain");
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].key(), b[0].key());
        assert!(a[0].same_instance(&b[0]), "{node} kernels differ");
        assert_eq!(
            cache.get_cached_kernel_id(&a[0]).expect("cached"),
            cache.get_cached_kernel_id(&b[0]).expect("cached")
        );
    }
    assert_eq!(cache.len(), 2);
}

#[test]
fn preseeded_kernels_match_pipeline_keys() {
    let built = KernelsCache::with_executor(
        KernelsCacheConfig::default(),
        Arc::new(RecordingCompiler::new()),
        Arc::new(InlineExecutor),
    )
    .expect("cache");
    add_subgraphs(&built);
    built.build_all().expect("build");
    let kernels: Vec<_> = ["concat_a", "conv_a"]
        .into_iter()
        .flat_map(|node| built.get_kernels(node).expect("kernels"))
        .collect();

    let compiler = Arc::new(RecordingCompiler::new());
    let seeded = KernelsCache::with_executor(KernelsCacheConfig::default(), compiler.clone(), Arc::new(InlineExecutor)).expect("cache");
    seeded.add_to_cached_kernels(&kernels);

    for kernel in &kernels {
        assert_eq!(&seeded.get_cached_kernel_id(kernel).expect("seeded"), kernel.key());
        assert_eq!(
            seeded.get_cached_kernel_id(kernel).expect("seeded"),
            built.get_cached_kernel_id(kernel).expect("built")
        );
    }

    let summary = seeded.add_kernels_source("conv_a", [conv()], false);
    assert_eq!(summary.cached, 1);
    assert_eq!(seeded.build_all().expect("build").batches, 0);
    assert_eq!(compiler.invocations(), 0);
    assert!(seeded.get_kernels("conv_a").expect("kernels")[0].same_instance(&kernels[1]));
}
