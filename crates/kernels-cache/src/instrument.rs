use std::sync::{
    OnceLock, atomic::{AtomicU64, Ordering}
};

use kernels_cache_env::LOG_LEVEL;
use tracing::Level;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

use crate::{error::KernelsCacheError, registry::AddSummary};

/// Running counters for one cache instance.
#[derive(Debug, Default)]
pub struct CacheStats {
    sources_added: AtomicU64,
    cache_hits: AtomicU64,
    pending_folded: AtomicU64,
    batches_compiled: AtomicU64,
    batches_failed: AtomicU64,
    kernels_inserted: AtomicU64,
    kernels_discarded: AtomicU64,
    external_kernels: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub sources_added: u64,
    pub cache_hits: u64,
    pub pending_folded: u64,
    pub batches_compiled: u64,
    pub batches_failed: u64,
    pub kernels_inserted: u64,
    pub kernels_discarded: u64,
    /// Pre-seeded kernels actually inserted; already cached ones are not counted.
    pub external_kernels: u64,
}

impl CacheStats {
    pub(crate) fn record_add(&self, sources: usize, summary: &AddSummary) {
        self.sources_added.fetch_add(sources as u64, Ordering::Relaxed);
        self.cache_hits.fetch_add(summary.cached as u64, Ordering::Relaxed);
        self.pending_folded.fetch_add(summary.folded as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self, ok: bool, inserted: usize, discarded: usize) {
        let counter = if ok { &self.batches_compiled } else { &self.batches_failed };
        counter.fetch_add(1, Ordering::Relaxed);
        self.kernels_inserted.fetch_add(inserted as u64, Ordering::Relaxed);
        self.kernels_discarded.fetch_add(discarded as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_external(&self, count: usize) {
        self.external_kernels.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            sources_added: self.sources_added.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            pending_folded: self.pending_folded.load(Ordering::Relaxed),
            batches_compiled: self.batches_compiled.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            kernels_inserted: self.kernels_inserted.load(Ordering::Relaxed),
            kernels_discarded: self.kernels_discarded.load(Ordering::Relaxed),
            external_kernels: self.external_kernels.load(Ordering::Relaxed),
        }
    }
}

/// Install a `fmt` subscriber at `KERNELS_CACHE_LOG_LEVEL` (default `INFO`).
///
/// `RUST_LOG` directives, when present, refine the filter per target. Safe to
/// call more than once; only the first call installs anything. If the host
/// already set a global subscriber that one is kept.
pub fn init_tracing() -> Result<(), KernelsCacheError> {
    static INIT: OnceLock<()> = OnceLock::new();
    if INIT.get().is_some() {
        return Ok(());
    }

    let level = LOG_LEVEL.get()?.unwrap_or(Level::INFO);
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter(level, &directives))
            .with_target(true)
            .try_init();
    });
    Ok(())
}

/// `level` as the default directive, overridden by `directives` where they match.
fn env_filter(level: Level, directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .parse_lossy(directives)
}

#[path = "instrument.test.rs"]
mod tests;
