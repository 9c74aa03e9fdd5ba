//! Content-addressed store of compiled kernels.
//!
//! Backed by a `moka` concurrent cache with neither a capacity bound nor an
//! idle timeout, so nothing is ever evicted: an entry, once written, lives as
//! long as the [`DedupCache`] itself.
//!
//! # Usage
//! ```text
//! let cache = DedupCache::new();
//! if cache.put(kernel.key().clone(), kernel.clone()) {
//!     // first writer for this content
//! }
//! let same = cache.get(kernel.key());
//! ```

use moka::sync::Cache;

use crate::{error::KernelsCacheError, kernel::CompiledKernel, key::KernelKey};

/// Shared `KernelKey -> CompiledKernel` map with first-writer-wins inserts.
pub struct DedupCache {
    kernels: Cache<KernelKey, CompiledKernel>,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DedupCache {
    pub fn new() -> Self {
        Self {
            kernels: Cache::builder().name("kernels_cache").build(),
        }
    }

    pub fn get(&self, key: &KernelKey) -> Option<CompiledKernel> {
        self.kernels.get(key)
    }

    pub fn contains(&self, key: &KernelKey) -> bool {
        self.kernels.contains_key(key)
    }

    /// Insert `kernel` under `key` unless an entry already exists.
    ///
    /// Returns `true` when this call inserted. Concurrent puts of one key are
    /// coalesced by `moka`'s entry API; exactly one of them sees `true` and the
    /// stored kernel never changes afterwards.
    pub fn put(&self, key: KernelKey, kernel: CompiledKernel) -> bool {
        self.kernels.entry(key).or_insert(kernel).is_fresh()
    }

    /// Insert a kernel built outside the pipeline, keyed by its own source.
    pub fn register_external(&self, kernel: CompiledKernel) -> KernelKey {
        self.try_register_external(kernel).unwrap_or_else(|key| key)
    }

    /// Like [`Self::register_external`], but tells whether the kernel was
    /// inserted (`Ok`) or an equal one was already cached (`Err`).
    pub fn try_register_external(&self, kernel: CompiledKernel) -> Result<KernelKey, KernelKey> {
        let key = kernel.key().clone();
        if self.put(key.clone(), kernel) {
            Ok(key)
        } else {
            tracing::trace!(target: "kernels_cache::dedup", %key, "external kernel already cached");
            Err(key)
        }
    }

    /// Key of the cached kernel whose content equals `kernel`'s.
    pub fn id_of(&self, kernel: &CompiledKernel) -> Result<KernelKey, KernelsCacheError> {
        let key = kernel.source().key();
        if self.contains(&key) {
            Ok(key)
        } else {
            Err(KernelsCacheError::KernelNotCached(key))
        }
    }

    /// Number of cached kernels. Flushes `moka`'s pending bookkeeping first so
    /// the count reflects every completed insert.
    pub fn len(&self) -> u64 {
        self.kernels.run_pending_tasks();
        self.kernels.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[path = "dedup.test.rs"]
mod tests;
