#![cfg(test)]

use std::sync::Arc;

use super::*;
use crate::{KernelHandle, KernelSource};

fn compiled(entry: &str) -> CompiledKernel {
    CompiledKernel::new(KernelSource::new(format!("void {entry}() {{}}"), "", entry), Arc::new(()) as KernelHandle)
}

#[test]
fn resolves_in_recorded_order() {
    let cache = DedupCache::new();
    let index = RequestIndex::new();
    let kernels: Vec<CompiledKernel> = ["c", "a", "b"].into_iter().map(compiled).collect();

    // Insert out of order; lookup order must still follow `record`.
    for k in kernels.iter().rev() {
        cache.put(k.key().clone(), k.clone());
    }
    index.record("node".into(), kernels.iter().map(|k| k.key().clone()));

    let ids: Vec<String> = index
        .get_kernels(&"node".into(), &cache)
        .expect("resolved")
        .iter()
        .map(|k| k.id().to_string())
        .collect();
    assert_eq!(ids, ["c", "a", "b"]);
}

#[test]
fn repeated_record_appends() {
    let index = RequestIndex::new();
    let a = compiled("a");
    let b = compiled("b");
    index.record("node".into(), [a.key().clone()]);
    index.record("node".into(), [b.key().clone(), a.key().clone()]);

    let keys = index.keys(&"node".into()).expect("recorded");
    assert_eq!(keys, vec![a.key().clone(), b.key().clone(), a.key().clone()]);
    assert_eq!(index.len(), 1);
}

#[test]
fn unknown_request_is_reported() {
    let index = RequestIndex::new();
    let err = index.get_kernels(&"nobody".into(), &DedupCache::new()).unwrap_err();
    assert!(matches!(err, KernelsCacheError::UnknownRequest(ref id) if id.as_str() == "nobody"));
}

#[test]
fn missing_entry_is_unresolved() {
    let cache = DedupCache::new();
    let index = RequestIndex::new();
    let built = compiled("built");
    let pending = compiled("pending");
    cache.put(built.key().clone(), built.clone());
    index.record("node".into(), [built.key().clone(), pending.key().clone()]);

    match index.get_kernels(&"node".into(), &cache) {
        Err(KernelsCacheError::UnresolvedKernel { request, key }) => {
            assert_eq!(request.as_str(), "node");
            assert_eq!(&key, pending.key());
        }
        other => panic!("expected UnresolvedKernel, got {other:?}"),
    }
}

#[test]
fn empty_request_resolves_to_nothing() {
    let index = RequestIndex::new();
    index.record("empty".into(), std::iter::empty());
    assert!(index.get_kernels(&"empty".into(), &DedupCache::new()).expect("known").is_empty());
}
