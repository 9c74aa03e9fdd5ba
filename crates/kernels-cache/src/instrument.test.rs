#![cfg(test)]

use kernels_cache_env::{CacheEnvVar, EnvVarGuard};
use serial_test::serial;

use super::*;

#[test]
fn snapshot_reflects_recorded_events() {
    let stats = CacheStats::default();
    stats.record_add(5, &AddSummary { cached: 2, queued: 2, folded: 1 });
    stats.record_batch(true, 3, 1);
    stats.record_batch(false, 0, 0);
    stats.record_external(4);

    assert_eq!(
        stats.snapshot(),
        CacheStatsSnapshot {
            sources_added: 5,
            cache_hits: 2,
            pending_folded: 1,
            batches_compiled: 1,
            batches_failed: 1,
            kernels_inserted: 3,
            kernels_discarded: 1,
            external_kernels: 4,
        }
    );
}

#[test]
#[serial]
fn init_tracing_rejects_bad_level_then_succeeds() {
    {
        let _bad = EnvVarGuard::set(CacheEnvVar::LogLevel, "chatty");
        assert!(matches!(init_tracing(), Err(KernelsCacheError::EnvVar(_))));
    }
    let _ok = EnvVarGuard::set(CacheEnvVar::LogLevel, "debug");
    init_tracing().expect("valid level");
    init_tracing().expect("idempotent");
}

#[test]
fn env_filter_defaults_to_configured_level() {
    assert_eq!(env_filter(Level::WARN, "").max_level_hint(), Some(LevelFilter::WARN));
}

#[test]
fn env_filter_directives_refine_targets() {
    let filter = env_filter(Level::WARN, "kernels_cache::build=trace");
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
}
