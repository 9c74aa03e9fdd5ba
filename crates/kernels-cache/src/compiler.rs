use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::{batch::Batch, kernel::KernelHandle};

/// Compiled output of one batch: entry point -> executable handle.
pub type CompiledProgram = FxHashMap<String, KernelHandle>;

/// Diagnostic returned by a device compiler when a batch does not build.
#[derive(Error, Debug, Clone)]
#[error("{log}")]
pub struct CompileError {
    pub log: String,
}

impl CompileError {
    pub fn new(log: impl Into<String>) -> Self {
        Self { log: log.into() }
    }
}

/// The device/runtime side that turns source text into executables.
///
/// Called from worker threads, one call per batch. `target` is the configured
/// device identifier and is passed through untouched. A successful result
/// should hold one handle per entry point in `batch`; missing entry points are
/// reported as a failure of that batch.
pub trait DeviceCompiler: Send + Sync {
    fn compile(&self, target: &str, batch: &Batch) -> Result<CompiledProgram, CompileError>;
}

impl<F> DeviceCompiler for F
where
    F: Fn(&str, &Batch) -> Result<CompiledProgram, CompileError> + Send + Sync,
{
    fn compile(&self, target: &str, batch: &Batch) -> Result<CompiledProgram, CompileError> {
        self(target, batch)
    }
}
