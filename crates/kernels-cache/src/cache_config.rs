use std::{num::NonZeroUsize, path::PathBuf};

use kernels_cache_env::{DUMP_SOURCES_DIR, MAX_BATCH_SOURCE_BYTES, MAX_KERNELS_PER_BATCH, STREAMS, TARGET, TypedEnvVar};

use crate::{batch::BatchLimits, error::KernelsCacheError};

pub const DEFAULT_MAX_KERNELS_PER_BATCH: usize = 8;
pub const DEFAULT_MAX_BATCH_SOURCE_BYTES: usize = 1 << 20;
pub const DEFAULT_TARGET: &str = "default";

/// Tunables of a [`crate::KernelsCache`].
///
/// Start from [`Default`] or [`KernelsCacheConfig::from_env`] and refine with
/// the `with_*` builders. Checked by [`KernelsCacheConfig::validate`] when the
/// cache is constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelsCacheConfig {
    pub max_kernels_per_batch: usize,
    pub max_batch_source_bytes: usize,
    /// Parallel compile workers.
    pub streams: usize,
    /// Device/target identifier passed to the compiler untouched.
    pub target: String,
    pub dump_sources_dir: Option<PathBuf>,
}

impl Default for KernelsCacheConfig {
    fn default() -> Self {
        Self {
            max_kernels_per_batch: DEFAULT_MAX_KERNELS_PER_BATCH,
            max_batch_source_bytes: DEFAULT_MAX_BATCH_SOURCE_BYTES,
            streams: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            target: DEFAULT_TARGET.to_string(),
            dump_sources_dir: None,
        }
    }
}

impl KernelsCacheConfig {
    /// Defaults overlaid with every `KERNELS_CACHE_*` variable that is set.
    pub fn from_env() -> Result<Self, KernelsCacheError> {
        let mut config = Self::default();
        if let Some(v) = read(&MAX_KERNELS_PER_BATCH)? {
            config.max_kernels_per_batch = v;
        }
        if let Some(v) = read(&MAX_BATCH_SOURCE_BYTES)? {
            config.max_batch_source_bytes = v;
        }
        if let Some(v) = read(&STREAMS)? {
            config.streams = v;
        }
        if let Some(v) = read(&TARGET)? {
            config.target = v;
        }
        if let Some(v) = read(&DUMP_SOURCES_DIR)? {
            config.dump_sources_dir = Some(v);
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_max_kernels_per_batch(mut self, max: usize) -> Self {
        self.max_kernels_per_batch = max;
        self
    }

    #[must_use]
    pub fn with_max_batch_source_bytes(mut self, max: usize) -> Self {
        self.max_batch_source_bytes = max;
        self
    }

    #[must_use]
    pub fn with_streams(mut self, streams: usize) -> Self {
        self.streams = streams;
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    #[must_use]
    pub fn with_dump_sources_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_sources_dir = Some(dir.into());
        self
    }

    pub fn validate(&self) -> Result<(), KernelsCacheError> {
        if self.max_kernels_per_batch == 0 {
            return Err(KernelsCacheError::Config("max_kernels_per_batch must be at least 1".to_string()));
        }
        if self.max_batch_source_bytes == 0 {
            return Err(KernelsCacheError::Config("max_batch_source_bytes must be at least 1".to_string()));
        }
        if self.streams == 0 {
            return Err(KernelsCacheError::Config("streams must be at least 1".to_string()));
        }
        Ok(())
    }

    #[inline]
    pub fn limits(&self) -> BatchLimits {
        BatchLimits::new(self.max_kernels_per_batch, self.max_batch_source_bytes)
    }
}

fn read<T>(var: &TypedEnvVar<T>) -> Result<Option<T>, KernelsCacheError> {
    var.get().map_err(|e| KernelsCacheError::Config(e.to_string()))
}

#[path = "cache_config.test.rs"]
mod tests;
