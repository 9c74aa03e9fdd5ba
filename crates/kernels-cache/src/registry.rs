//! Intake of kernel sources and the shared pending queue.

use std::sync::{Arc, Mutex, PoisonError};

use rustc_hash::FxHashSet;

use crate::{
    batch::{BatchGroup, PendingKernel}, dedup::DedupCache, instrument::CacheStats, key::KernelKey, request::RequestId, request_index::RequestIndex, source::KernelSource
};

/// What one `add` call did with its sources.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddSummary {
    /// Already compiled; nothing to do.
    pub cached: usize,
    /// Newly appended to the pending queue.
    pub queued: usize,
    /// Same content already pending; folded into that slot.
    pub folded: usize,
}

#[derive(Default)]
struct PendingQueue {
    kernels: Vec<PendingKernel>,
    keys: FxHashSet<KernelKey>,
    next_private_group: u64,
}

/// Computes keys for incoming sources, short-circuits cache hits and queues the
/// rest (one slot per distinct key) for the next `build_all`.
pub struct SourceRegistry {
    pending: Mutex<PendingQueue>,
    cache: Arc<DedupCache>,
    index: Arc<RequestIndex>,
    stats: Arc<CacheStats>,
}

impl SourceRegistry {
    pub fn new(cache: Arc<DedupCache>, index: Arc<RequestIndex>, stats: Arc<CacheStats>) -> Self {
        Self {
            pending: Mutex::new(PendingQueue::default()),
            cache,
            index,
            stats,
        }
    }

    pub fn add<I, S>(&self, request: RequestId, sources: I, force_new_batch: bool) -> AddSummary
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<KernelSource>>,
    {
        let sources: Vec<Arc<KernelSource>> = sources.into_iter().map(Into::into).collect();
        let keys: Vec<KernelKey> = sources.iter().map(|s| s.key()).collect();
        let mut summary = AddSummary::default();

        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            let group = if force_new_batch {
                pending.next_private_group += 1;
                BatchGroup::Private(pending.next_private_group)
            } else {
                BatchGroup::Shared
            };

            for (source, key) in sources.into_iter().zip(&keys) {
                if self.cache.contains(key) {
                    summary.cached += 1;
                    tracing::trace!(target: "kernels_cache::registry", %key, "cache hit");
                } else if pending.keys.contains(key) {
                    summary.folded += 1;
                    tracing::trace!(target: "kernels_cache::registry", %key, "already pending");
                } else {
                    pending.keys.insert(key.clone());
                    pending.kernels.push(PendingKernel {
                        key: key.clone(),
                        source,
                        group,
                    });
                    summary.queued += 1;
                }
            }
        }

        self.stats.record_add(keys.len(), &summary);
        tracing::debug!(
            target: "kernels_cache::registry",
            request = %request,
            sources = keys.len(),
            cached = summary.cached,
            queued = summary.queued,
            folded = summary.folded,
            force_new_batch,
            "added kernel sources"
        );

        self.index.record(request, keys);
        summary
    }

    /// Take every pending unit, in queue order, leaving the queue empty.
    pub fn drain_pending(&self) -> Vec<PendingKernel> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.keys.clear();
        std::mem::take(&mut pending.kernels)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).kernels.len()
    }

    pub fn is_pending(&self, key: &KernelKey) -> bool {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).keys.contains(key)
    }
}

#[path = "registry.test.rs"]
mod tests;
