#![cfg(test)]

use super::*;
use crate::{CompiledKernel, KernelHandle};

struct Fixture {
    cache: Arc<DedupCache>,
    index: Arc<RequestIndex>,
    stats: Arc<CacheStats>,
    registry: SourceRegistry,
}

fn fixture() -> Fixture {
    let cache = Arc::new(DedupCache::new());
    let index = Arc::new(RequestIndex::new());
    let stats = Arc::new(CacheStats::default());
    let registry = SourceRegistry::new(Arc::clone(&cache), Arc::clone(&index), Arc::clone(&stats));
    Fixture {
        cache,
        index,
        stats,
        registry,
    }
}

fn source(entry: &str) -> KernelSource {
    KernelSource::new(format!("__kernel void {entry}() {{}}"), "-cl-mad-enable", entry)
}

#[test]
fn records_keys_in_call_order() {
    let fx = fixture();
    let sources = vec![source("b"), source("a"), source("c")];
    let expected: Vec<KernelKey> = sources.iter().map(KernelSource::key).collect();

    let summary = fx.registry.add("node".into(), sources, false);
    assert_eq!(summary.queued, 3);
    assert_eq!(fx.index.keys(&"node".into()), Some(expected));
    assert_eq!(fx.registry.pending_len(), 3);
}

#[test]
fn identical_sources_share_one_pending_slot() {
    let fx = fixture();
    fx.registry.add("conv1".into(), [source("conv")], false);
    let summary = fx.registry.add("conv2".into(), [source("conv")], false);

    assert_eq!(summary, AddSummary { cached: 0, queued: 0, folded: 1 });
    assert_eq!(fx.registry.pending_len(), 1);
    assert_eq!(fx.index.keys(&"conv1".into()), fx.index.keys(&"conv2".into()));
}

#[test]
fn duplicates_within_one_call_are_folded_but_recorded_twice() {
    let fx = fixture();
    let summary = fx.registry.add("node".into(), [source("k"), source("k")], false);
    assert_eq!(summary.queued, 1);
    assert_eq!(summary.folded, 1);
    assert_eq!(fx.index.keys(&"node".into()).map(|k| k.len()), Some(2));
}

#[test]
fn cached_sources_are_not_queued() {
    let fx = fixture();
    let cached = CompiledKernel::new(source("done"), std::sync::Arc::new(()) as KernelHandle);
    fx.cache.register_external(cached);

    let summary = fx.registry.add("node".into(), [source("done"), source("todo")], false);
    assert_eq!(summary.cached, 1);
    assert_eq!(summary.queued, 1);
    assert!(!fx.registry.is_pending(&source("done").key()));
    assert!(fx.registry.is_pending(&source("todo").key()));
    assert_eq!(fx.stats.snapshot().cache_hits, 1);
}

#[test]
fn force_new_batch_assigns_private_groups() {
    let fx = fixture();
    fx.registry.add("shared".into(), [source("a")], false);
    fx.registry.add("forced1".into(), [source("b"), source("c")], true);
    fx.registry.add("forced2".into(), [source("d")], true);

    let groups: Vec<BatchGroup> = fx.registry.drain_pending().into_iter().map(|p| p.group).collect();
    assert_eq!(groups[0], BatchGroup::Shared);
    assert_eq!(groups[1], groups[2]);
    assert!(matches!(groups[1], BatchGroup::Private(_)));
    assert_ne!(groups[2], groups[3]);
    assert!(matches!(groups[3], BatchGroup::Private(_)));
}

#[test]
fn drain_empties_queue_and_allows_requeue() {
    let fx = fixture();
    fx.registry.add("node".into(), [source("k")], false);
    assert_eq!(fx.registry.drain_pending().len(), 1);
    assert_eq!(fx.registry.pending_len(), 0);

    // Not cached (never built), so a later add queues it again.
    let summary = fx.registry.add("retry".into(), [source("k")], false);
    assert_eq!(summary.queued, 1);
}

#[test]
fn concurrent_adds_keep_each_request_ordered() {
    let fx = Arc::new(fixture());
    let handles: Vec<_> = (0..4usize)
        .map(|t| {
            let fx = Arc::clone(&fx);
            std::thread::spawn(move || {
                let sources: Vec<KernelSource> = (0..16).map(|i| source(&format!("t{t}_k{i}"))).collect();
                fx.registry.add(t.into(), sources, false);
            })
        })
        .collect();
    for h in handles {
        h.join().expect("thread");
    }

    for t in 0..4usize {
        let keys = fx.index.keys(&t.into()).expect("recorded");
        let entries: Vec<String> = keys.iter().map(|k| k.entry_point().to_string()).collect();
        let expected: Vec<String> = (0..16).map(|i| format!("t{t}_k{i}")).collect();
        assert_eq!(entries, expected);
    }
    assert_eq!(fx.registry.pending_len(), 64);
}
