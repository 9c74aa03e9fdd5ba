#![cfg(test)]

use std::sync::{Arc, Barrier};

use super::*;
use crate::{KernelHandle, KernelSource};

fn kernel(entry: &str, tag: u32) -> CompiledKernel {
    let source = KernelSource::new(format!("__kernel void {entry}() {{}}"), "-cl-fast-relaxed-math", entry);
    CompiledKernel::new(source, Arc::new(tag) as KernelHandle)
}

#[test]
fn put_is_first_writer_wins() {
    let cache = DedupCache::new();
    let first = kernel("k", 1);
    let second = kernel("k", 2);
    assert_eq!(first.key(), second.key());

    assert!(cache.put(first.key().clone(), first.clone()));
    assert!(!cache.put(second.key().clone(), second));

    let stored = cache.get(first.key()).expect("cached");
    assert_eq!(stored.downcast_handle::<u32>(), Some(&1));
    assert!(stored.same_instance(&first));
    assert_eq!(cache.len(), 1);
}

#[test]
fn racing_puts_leave_one_entry() {
    let cache = Arc::new(DedupCache::new());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8u32)
        .map(|tag| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                let k = kernel("raced", tag);
                barrier.wait();
                cache.put(k.key().clone(), k)
            })
        })
        .collect();

    let inserted = handles.into_iter().map(|h| h.join().expect("thread")).filter(|fresh| *fresh).count();
    assert_eq!(inserted, 1);
    assert_eq!(cache.len(), 1);

    let key = kernel("raced", 0).key().clone();
    let a = cache.get(&key).expect("cached");
    let b = cache.get(&key).expect("cached");
    assert!(a.same_instance(&b));
}

#[test]
fn contains_and_get_miss() {
    let cache = DedupCache::new();
    let k = kernel("absent", 0);
    assert!(!cache.contains(k.key()));
    assert!(cache.get(k.key()).is_none());
    assert!(cache.is_empty());
}

#[test]
fn register_external_matches_by_content() {
    let cache = DedupCache::new();
    let built_here = kernel("conv", 10);
    let key = cache.register_external(built_here);

    let same_content_elsewhere = kernel("conv", 99);
    assert_eq!(cache.id_of(&same_content_elsewhere).expect("content is cached"), key);
}

#[test]
fn id_of_unknown_kernel_fails() {
    let cache = DedupCache::new();
    match cache.id_of(&kernel("missing", 0)) {
        Err(KernelsCacheError::KernelNotCached(key)) => assert_eq!(key.entry_point(), "missing"),
        other => panic!("expected KernelNotCached, got {other:?}"),
    }
}

#[test]
fn colliding_keys_stay_separate_entries() {
    let cache = DedupCache::new();
    let first = KernelKey::with_forced_hash(42, "__kernel void k() { first(); }", "", "k");
    let second = KernelKey::with_forced_hash(42, "__kernel void k() { second(); }", "", "k");

    assert!(cache.put(first.clone(), kernel("k", 1)));
    assert!(cache.put(second.clone(), kernel("k", 2)));
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(&first).expect("first").downcast_handle::<u32>(), Some(&1));
    assert_eq!(cache.get(&second).expect("second").downcast_handle::<u32>(), Some(&2));
}

#[test]
fn try_register_external_reports_existing_entry() {
    let cache = DedupCache::new();
    let first = kernel("k", 1);
    assert_eq!(cache.try_register_external(first.clone()), Ok(first.key().clone()));
    assert_eq!(cache.try_register_external(kernel("k", 2)), Err(first.key().clone()));
    assert_eq!(cache.register_external(kernel("k", 3)), first.key().clone());
    assert!(cache.get(first.key()).expect("cached").same_instance(&first));
}
