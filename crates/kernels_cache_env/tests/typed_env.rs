use kernels_cache_env::{CacheEnvVar, EnvVarError, EnvVarGuard, MAX_KERNELS_PER_BATCH, STREAMS, TARGET};
use serial_test::serial;

#[test]
#[serial]
fn set_guard_restores_previous_value() {
    let _outer = EnvVarGuard::set(CacheEnvVar::Streams, "3");
    {
        let guard = STREAMS.set_guard(7).expect("set streams");
        assert_eq!(*guard, 7);
        assert_eq!(STREAMS.get().expect("parse"), Some(7));
    }
    assert_eq!(STREAMS.get().expect("parse"), Some(3));
}

#[test]
#[serial]
fn set_guard_removes_variable_that_was_absent() {
    let _clear = EnvVarGuard::unset(CacheEnvVar::Target);
    {
        let _guard = TARGET.set_guard("gpu.1".to_string()).expect("set target");
        assert_eq!(TARGET.get().expect("parse").as_deref(), Some("gpu.1"));
    }
    assert_eq!(TARGET.get().expect("parse"), None);
}

#[test]
#[serial]
fn malformed_value_reports_key_and_raw_text() {
    let _bad = EnvVarGuard::set(CacheEnvVar::MaxKernelsPerBatch, "lots");
    match MAX_KERNELS_PER_BATCH.get() {
        Err(EnvVarError::Parse { name, value, .. }) => {
            assert_eq!(name, "KERNELS_CACHE_MAX_KERNELS_PER_BATCH");
            assert_eq!(value, "lots");
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}
