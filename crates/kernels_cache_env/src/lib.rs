//! Typed process-environment access for the kernels cache.
//!
//! Every tunable of the cache can be overridden through a `KERNELS_CACHE_*`
//! variable. Reads and writes go through [`Environment`] so tests that mutate
//! the process environment stay serialised.

pub mod environment;

pub use environment::{
    EnvVar, Environment, cache::{
        CacheEnvVar, DUMP_SOURCES_DIR, LOG_LEVEL, MAX_BATCH_SOURCE_BYTES, MAX_KERNELS_PER_BATCH, STREAMS, TARGET
    }, guard::EnvVarGuard, value::{EnvVarError, EnvVarFormatError, EnvVarParseError, TypedEnvVar, TypedEnvVarGuard}
};
