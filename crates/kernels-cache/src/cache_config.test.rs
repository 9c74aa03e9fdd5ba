#![cfg(test)]

use kernels_cache_env::{CacheEnvVar, EnvVarGuard};
use serial_test::serial;

use super::*;

fn clear_env() -> Vec<EnvVarGuard> {
    [
        CacheEnvVar::MaxKernelsPerBatch,
        CacheEnvVar::MaxBatchSourceBytes,
        CacheEnvVar::Streams,
        CacheEnvVar::Target,
        CacheEnvVar::DumpSourcesDir,
    ]
    .into_iter()
    .map(EnvVarGuard::unset)
    .collect()
}

#[test]
fn defaults_are_valid() {
    let config = KernelsCacheConfig::default();
    assert_eq!(config.max_kernels_per_batch, DEFAULT_MAX_KERNELS_PER_BATCH);
    assert_eq!(config.max_batch_source_bytes, 1 << 20);
    assert!(config.streams >= 1);
    assert_eq!(config.target, "default");
    assert!(config.dump_sources_dir.is_none());
    config.validate().expect("defaults validate");
}

#[test]
fn validate_rejects_zero_bounds() {
    for config in [
        KernelsCacheConfig::default().with_max_kernels_per_batch(0),
        KernelsCacheConfig::default().with_max_batch_source_bytes(0),
        KernelsCacheConfig::default().with_streams(0),
    ] {
        assert!(matches!(config.validate(), Err(KernelsCacheError::Config(_))), "{config:?}");
    }
}

#[test]
fn limits_follow_config() {
    let config = KernelsCacheConfig::default()
        .with_max_kernels_per_batch(3)
        .with_max_batch_source_bytes(4096);
    assert_eq!(config.limits(), BatchLimits::new(3, 4096));
}

#[test]
#[serial]
fn from_env_without_variables_is_default() {
    let _clear = clear_env();
    assert_eq!(KernelsCacheConfig::from_env().expect("from env"), KernelsCacheConfig::default());
}

#[test]
#[serial]
fn from_env_overlays_set_variables() {
    let _clear = clear_env();
    let _batch = EnvVarGuard::set(CacheEnvVar::MaxKernelsPerBatch, "4");
    let _streams = EnvVarGuard::set(CacheEnvVar::Streams, "2");
    let _target = EnvVarGuard::set(CacheEnvVar::Target, "gpu.1");
    let _dump = EnvVarGuard::set(CacheEnvVar::DumpSourcesDir, "/tmp/kernels");

    let config = KernelsCacheConfig::from_env().expect("from env");
    assert_eq!(config.max_kernels_per_batch, 4);
    assert_eq!(config.max_batch_source_bytes, DEFAULT_MAX_BATCH_SOURCE_BYTES);
    assert_eq!(config.streams, 2);
    assert_eq!(config.target, "gpu.1");
    assert_eq!(config.dump_sources_dir, Some(PathBuf::from("/tmp/kernels")));
}

#[test]
#[serial]
fn malformed_variable_is_a_config_error() {
    let _clear = clear_env();
    let _bytes = EnvVarGuard::set(CacheEnvVar::MaxBatchSourceBytes, "a lot");
    let err = KernelsCacheConfig::from_env().unwrap_err();
    match err {
        KernelsCacheError::Config(message) => assert!(message.contains("KERNELS_CACHE_MAX_BATCH_SOURCE_BYTES"), "{message}"),
        other => panic!("expected config error, got {other:?}"),
    }
}
