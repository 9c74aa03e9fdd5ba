//! Catalogue of `KERNELS_CACHE_*` variables and their typed descriptors.

use std::path::PathBuf;

use tracing::Level;

use super::{
    EnvVar, value::{EnvVarFormatError, EnvVarParseError, TypedEnvVar}
};

/// Variables recognised by the kernels cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheEnvVar {
    /// Upper bound on kernels compiled in one compiler invocation.
    MaxKernelsPerBatch,
    /// Upper bound on the combined source length of one batch, in bytes.
    MaxBatchSourceBytes,
    /// Number of parallel compile workers.
    Streams,
    /// Opaque device/target identifier handed to the compiler.
    Target,
    /// Directory that receives a copy of every batch's source before compilation.
    DumpSourcesDir,
    /// Log level used by `init_tracing`.
    LogLevel,
}

impl CacheEnvVar {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            CacheEnvVar::MaxKernelsPerBatch => "KERNELS_CACHE_MAX_KERNELS_PER_BATCH",
            CacheEnvVar::MaxBatchSourceBytes => "KERNELS_CACHE_MAX_BATCH_SOURCE_BYTES",
            CacheEnvVar::Streams => "KERNELS_CACHE_STREAMS",
            CacheEnvVar::Target => "KERNELS_CACHE_TARGET",
            CacheEnvVar::DumpSourcesDir => "KERNELS_CACHE_DUMP_SOURCES_DIR",
            CacheEnvVar::LogLevel => "KERNELS_CACHE_LOG_LEVEL",
        }
    }

    #[must_use]
    pub const fn into_env(self) -> EnvVar {
        EnvVar::Cache(self)
    }
}

pub const MAX_KERNELS_PER_BATCH: TypedEnvVar<usize> =
    TypedEnvVar::new(CacheEnvVar::MaxKernelsPerBatch.into_env(), parse_usize, format_usize);
pub const MAX_BATCH_SOURCE_BYTES: TypedEnvVar<usize> =
    TypedEnvVar::new(CacheEnvVar::MaxBatchSourceBytes.into_env(), parse_usize, format_usize);
pub const STREAMS: TypedEnvVar<usize> = TypedEnvVar::new(CacheEnvVar::Streams.into_env(), parse_usize, format_usize);
pub const TARGET: TypedEnvVar<String> = TypedEnvVar::new(CacheEnvVar::Target.into_env(), parse_string, format_string);
pub const DUMP_SOURCES_DIR: TypedEnvVar<PathBuf> = TypedEnvVar::new(CacheEnvVar::DumpSourcesDir.into_env(), parse_path, format_path);
pub const LOG_LEVEL: TypedEnvVar<Level> = TypedEnvVar::new(CacheEnvVar::LogLevel.into_env(), parse_log_level, format_level);

fn parse_usize(value: &str) -> Result<usize, EnvVarParseError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| EnvVarParseError::new("value is not a valid usize"))
}

fn format_usize(value: &usize) -> Result<String, EnvVarFormatError> {
    Ok(value.to_string())
}

fn parse_string(value: &str) -> Result<String, EnvVarParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EnvVarParseError::new("value is empty"));
    }
    Ok(trimmed.to_string())
}

fn format_string(value: &String) -> Result<String, EnvVarFormatError> {
    if value.contains('\0') {
        return Err(EnvVarFormatError::new("value contains a NUL byte"));
    }
    Ok(value.clone())
}

fn parse_path(value: &str) -> Result<PathBuf, EnvVarParseError> {
    parse_string(value).map(PathBuf::from)
}

fn format_path(path: &PathBuf) -> Result<String, EnvVarFormatError> {
    Ok(path.to_string_lossy().into_owned())
}

fn parse_log_level(value: &str) -> Result<Level, EnvVarParseError> {
    value.trim().parse::<Level>().map_err(|_| EnvVarParseError::new("invalid tracing level"))
}

fn format_level(level: &Level) -> Result<String, EnvVarFormatError> {
    Ok(level.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        for var in [
            CacheEnvVar::MaxKernelsPerBatch,
            CacheEnvVar::MaxBatchSourceBytes,
            CacheEnvVar::Streams,
            CacheEnvVar::Target,
            CacheEnvVar::DumpSourcesDir,
            CacheEnvVar::LogLevel,
        ] {
            assert!(var.key().starts_with("KERNELS_CACHE_"), "{}", var.key());
        }
    }

    #[test]
    fn parse_usize_trims_whitespace() {
        assert_eq!(parse_usize(" 12 ").unwrap(), 12);
        assert!(parse_usize("twelve").is_err());
        assert!(parse_usize("-1").is_err());
    }

    #[test]
    fn parse_string_rejects_blank() {
        assert!(parse_string("   ").is_err());
        assert_eq!(parse_string(" gpu.0 ").unwrap(), "gpu.0");
    }

    #[test]
    fn log_level_is_case_insensitive() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
        assert!(parse_log_level("loud").is_err());
    }
}
