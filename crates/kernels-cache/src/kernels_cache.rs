//! The cache object graph nodes talk to.

use std::sync::Arc;

use crate::{
    builder::{BatchBuilder, BuildReport}, cache_config::KernelsCacheConfig, compiler::DeviceCompiler, dedup::DedupCache, error::KernelsCacheError, executor::{TaskExecutor, ThreadPoolExecutor}, instrument::{CacheStats, CacheStatsSnapshot}, kernel::CompiledKernel, key::KernelKey, registry::{AddSummary, SourceRegistry}, request::RequestId, request_index::RequestIndex, source::KernelSource
};

/// Deduplicating, batching compile cache for GPU kernels.
///
/// Typical use:
/// 1. every node registers its sources with [`KernelsCache::add_kernels_source`];
/// 2. one [`KernelsCache::build_all`] compiles everything new;
/// 3. each node fetches its kernels with [`KernelsCache::get_kernels`], in the
///    order it added them.
///
/// All methods take `&self`; the cache can be shared between threads.
pub struct KernelsCache {
    config: KernelsCacheConfig,
    cache: Arc<DedupCache>,
    stats: Arc<CacheStats>,
    index: Arc<RequestIndex>,
    registry: SourceRegistry,
    builder: BatchBuilder,
}

impl KernelsCache {
    /// Cache compiling on a dedicated pool of `config.streams` threads.
    pub fn new(config: KernelsCacheConfig, compiler: Arc<dyn DeviceCompiler>) -> Result<Self, KernelsCacheError> {
        config.validate()?;
        let executor = Arc::new(ThreadPoolExecutor::new(config.streams)?);
        Self::with_executor(config, compiler, executor)
    }

    pub fn with_executor(
        config: KernelsCacheConfig,
        compiler: Arc<dyn DeviceCompiler>,
        executor: Arc<dyn TaskExecutor>,
    ) -> Result<Self, KernelsCacheError> {
        config.validate()?;

        let cache = Arc::new(DedupCache::new());
        let stats = Arc::new(CacheStats::default());
        let index = Arc::new(RequestIndex::new());
        let registry = SourceRegistry::new(Arc::clone(&cache), Arc::clone(&index), Arc::clone(&stats));
        let builder = BatchBuilder::new(
            compiler,
            executor,
            Arc::clone(&cache),
            Arc::clone(&stats),
            config.limits(),
            config.target.clone(),
        )
        .with_dump_dir(config.dump_sources_dir.clone());

        tracing::debug!(
            target: "kernels_cache",
            target_device = %config.target,
            streams = config.streams,
            max_kernels_per_batch = config.max_kernels_per_batch,
            max_batch_source_bytes = config.max_batch_source_bytes,
            "kernels cache created"
        );

        Ok(Self {
            config,
            cache,
            stats,
            index,
            registry,
            builder,
        })
    }

    /// Register sources for `request`; compilation waits for the next [`Self::build_all`].
    ///
    /// With `force_new_batch` the sources are never batched together with
    /// sources from other calls.
    pub fn add_kernels_source<I, S>(&self, request: impl Into<RequestId>, sources: I, force_new_batch: bool) -> AddSummary
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<KernelSource>>,
    {
        self.registry.add(request.into(), sources, force_new_batch)
    }

    /// Compile every pending source; see [`BatchBuilder::build_all`].
    pub fn build_all(&self) -> Result<BuildReport, KernelsCacheError> {
        self.builder.build_all(&self.registry)
    }

    /// Compiled kernels of `request`, in the order they were added.
    pub fn get_kernels(&self, request: impl Into<RequestId>) -> Result<Vec<CompiledKernel>, KernelsCacheError> {
        self.index.get_kernels(&request.into(), &self.cache)
    }

    /// Pre-seed the cache with kernels built elsewhere (e.g. loaded from disk).
    ///
    /// Entries whose content is already cached are left untouched.
    pub fn add_to_cached_kernels(&self, kernels: &[CompiledKernel]) {
        let mut inserted = 0;
        for kernel in kernels {
            if let Ok(key) = self.cache.try_register_external(kernel.clone()) {
                inserted += 1;
                tracing::trace!(target: "kernels_cache", %key, "registered external kernel");
            }
        }
        self.stats.record_external(inserted);
        tracing::debug!(target: "kernels_cache", offered = kernels.len(), inserted, "pre-seeded kernels");
    }

    /// Key under which a kernel of equal content is cached.
    pub fn get_cached_kernel_id(&self, kernel: &CompiledKernel) -> Result<KernelKey, KernelsCacheError> {
        self.cache.id_of(kernel)
    }

    pub fn get_kernel_from_cached_kernels(&self, key: &KernelKey) -> Option<CompiledKernel> {
        self.cache.get(key)
    }

    pub fn pending_len(&self) -> usize {
        self.registry.pending_len()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &KernelsCacheConfig {
        &self.config
    }

    /// Number of compiled kernels held.
    pub fn len(&self) -> u64 {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[path = "kernels_cache.test.rs"]
mod tests;
