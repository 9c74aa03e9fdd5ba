//! Per-request ordered key lists and their resolution to compiled kernels.

use std::sync::{Mutex, PoisonError};

use rustc_hash::FxHashMap;

use crate::{dedup::DedupCache, error::KernelsCacheError, kernel::CompiledKernel, key::KernelKey, request::RequestId};

/// `RequestId -> [KernelKey]` in submission order.
///
/// Keys are resolved lazily, so the observable order is the order of `record`
/// calls and never the order in which batches finished compiling.
#[derive(Default)]
pub struct RequestIndex {
    requests: Mutex<FxHashMap<RequestId, Vec<KernelKey>>>,
}

impl RequestIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `keys` to the list of `request`, creating it on first use.
    pub fn record(&self, request: RequestId, keys: impl IntoIterator<Item = KernelKey>) {
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        requests.entry(request).or_default().extend(keys);
    }

    pub fn keys(&self, request: &RequestId) -> Option<Vec<KernelKey>> {
        let requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        requests.get(request).cloned()
    }

    pub fn len(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve every key recorded for `request`, in recorded order.
    ///
    /// Fails on the first key without a cache entry: either `build_all` has
    /// not run since it was added, or its batch failed.
    pub fn get_kernels(&self, request: &RequestId, cache: &DedupCache) -> Result<Vec<CompiledKernel>, KernelsCacheError> {
        let keys = self
            .keys(request)
            .ok_or_else(|| KernelsCacheError::UnknownRequest(request.clone()))?;

        keys.into_iter()
            .map(|key| {
                cache.get(&key).ok_or_else(|| KernelsCacheError::UnresolvedKernel {
                    request: request.clone(),
                    key,
                })
            })
            .collect()
    }
}

#[path = "request_index.test.rs"]
mod tests;
