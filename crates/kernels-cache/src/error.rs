use kernels_cache_env::EnvVarError;
use thiserror::Error;

use crate::{key::KernelKey, request::RequestId};

/// One batch whose compiler invocation failed.
///
/// Failures are collected per batch and never abort other batches.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("batch {batch_id} [{}] failed to compile: {}", .entry_points.join(", "), .diagnostics.trim_end())]
pub struct CompileFailure {
    pub batch_id: usize,
    pub build_options: String,
    pub entry_points: Vec<String>,
    pub diagnostics: String,
}

#[derive(Error, Debug)]
pub enum KernelsCacheError {
    #[error("{} kernel batch(es) failed to compile", .0.len())]
    BuildFailed(Vec<CompileFailure>),
    #[error("Kernel {key} requested by '{request}' is not compiled")]
    UnresolvedKernel { request: RequestId, key: KernelKey },
    #[error("Unknown request '{0}'")]
    UnknownRequest(RequestId),
    #[error("Kernel {0} is not in the cache")]
    KernelNotCached(KernelKey),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Executor error: {0}")]
    Executor(String),
    #[error("Source dump failed: {0}")]
    Dump(String),
    #[error(transparent)]
    EnvVar(#[from] EnvVarError),
}

impl KernelsCacheError {
    /// Failed batches carried by a [`KernelsCacheError::BuildFailed`]; empty otherwise.
    pub fn compile_failures(&self) -> &[CompileFailure] {
        match self {
            KernelsCacheError::BuildFailed(failures) => failures,
            _ => &[],
        }
    }
}
