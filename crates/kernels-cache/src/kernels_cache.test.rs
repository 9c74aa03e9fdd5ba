#![cfg(test)]

use super::*;
use crate::{Batch, CompileError, CompiledProgram, InlineExecutor, KernelHandle};

fn compile_everything(_target: &str, batch: &Batch) -> Result<CompiledProgram, CompileError> {
    Ok(batch
        .entry_points()
        .map(|ep| (ep.to_owned(), Arc::new(ep.to_owned()) as KernelHandle))
        .collect())
}

fn inline_cache() -> KernelsCache {
    KernelsCache::with_executor(
        KernelsCacheConfig::default().with_streams(1),
        Arc::new(compile_everything),
        Arc::new(InlineExecutor),
    )
    .expect("valid config")
}

fn source(entry: &str) -> KernelSource {
    KernelSource::new(format!("__kernel void {entry}() {{}}"), "", entry)
}

#[test]
fn invalid_config_is_rejected() {
    let result = KernelsCache::new(KernelsCacheConfig::default().with_streams(0), Arc::new(compile_everything));
    assert!(matches!(result, Err(KernelsCacheError::Config(_))));
}

#[test]
fn add_build_get_round() {
    let cache = inline_cache();
    let summary = cache.add_kernels_source("node", [source("a"), source("b")], false);
    assert_eq!(summary.queued, 2);
    assert_eq!(cache.pending_len(), 2);

    assert!(matches!(cache.get_kernels("node"), Err(KernelsCacheError::UnresolvedKernel { .. })));

    cache.build_all().expect("build");
    assert_eq!(cache.pending_len(), 0);
    let ids: Vec<_> = cache.get_kernels("node").expect("kernels").iter().map(|k| k.id().to_owned()).collect();
    assert_eq!(ids, ["a", "b"]);
    assert_eq!(cache.len(), 2);
}

#[test]
fn unknown_request_is_reported() {
    let cache = inline_cache();
    assert!(matches!(cache.get_kernels("nobody"), Err(KernelsCacheError::UnknownRequest(_))));
}

#[test]
fn preseeded_kernel_short_circuits_add() {
    let cache = inline_cache();
    let seeded = CompiledKernel::new(source("a"), Arc::new(7u32) as KernelHandle);
    cache.add_to_cached_kernels(std::slice::from_ref(&seeded));

    let key = cache.get_cached_kernel_id(&seeded).expect("cached");
    assert_eq!(key, source("a").key());
    assert!(cache.get_kernel_from_cached_kernels(&key).expect("present").same_instance(&seeded));

    let summary = cache.add_kernels_source("node", [source("a")], false);
    assert_eq!(summary.cached, 1);
    assert_eq!(cache.pending_len(), 0);
    assert!(cache.get_kernels("node").expect("resolved")[0].same_instance(&seeded));
    assert_eq!(cache.stats().external_kernels, 1);
}

#[test]
fn uncached_kernel_has_no_id() {
    let cache = inline_cache();
    let stray = CompiledKernel::new(source("stray"), Arc::new(()) as KernelHandle);
    assert!(matches!(cache.get_cached_kernel_id(&stray), Err(KernelsCacheError::KernelNotCached(_))));
}

#[test]
fn external_counter_skips_already_cached_kernels() {
    let cache = inline_cache();
    cache.add_kernels_source("node", [source("a")], false);
    cache.build_all().expect("build");

    let rebuilt = CompiledKernel::new(source("a"), Arc::new(1u32) as KernelHandle);
    let fresh = CompiledKernel::new(source("b"), Arc::new(2u32) as KernelHandle);
    cache.add_to_cached_kernels(&[rebuilt.clone(), fresh.clone(), fresh]);

    assert_eq!(cache.stats().external_kernels, 1);
    let kept = cache.get_kernel_from_cached_kernels(rebuilt.key()).expect("cached");
    assert!(!kept.same_instance(&rebuilt));
}
