#![allow(dead_code)]

use std::{
    sync::{
        Arc, Mutex, atomic::{AtomicUsize, Ordering}
    }, thread, time::Duration
};

use kernels_cache::{Batch, CompileError, CompiledProgram, DeviceCompiler, KernelHandle, KernelSource};

/// Handle produced by [`RecordingCompiler`]; identifies the invocation that built it.
#[derive(Debug, PartialEq, Eq)]
pub struct MockBinary {
    pub entry_point: String,
    pub invocation: usize,
}

/// Device compiler double that records every batch it sees.
#[derive(Default)]
pub struct RecordingCompiler {
    invocations: AtomicUsize,
    batches: Mutex<Vec<Vec<String>>>,
    fail_on: Option<String>,
    delay_first_batch: Option<Duration>,
}

impl RecordingCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every batch that contains `entry_point`.
    pub fn failing_on(mut self, entry_point: &str) -> Self {
        self.fail_on = Some(entry_point.to_string());
        self
    }

    /// Hold batch 0 back so later batches finish first.
    pub fn delaying_first_batch(mut self, delay: Duration) -> Self {
        self.delay_first_batch = Some(delay);
        self
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Entry points of every compiled batch, in completion order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().expect("batches lock").clone()
    }
}

impl DeviceCompiler for RecordingCompiler {
    fn compile(&self, _target: &str, batch: &Batch) -> Result<CompiledProgram, CompileError> {
        let invocation = self.invocations.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay_first_batch.filter(|_| batch.id() == 0) {
            thread::sleep(delay);
        }

        let entry_points: Vec<String> = batch.entry_points().map(str::to_owned).collect();
        self.batches.lock().expect("batches lock").push(entry_points.clone());

        if let Some(bad) = self.fail_on.as_deref().filter(|bad| batch.contains_entry_point(bad)) {
            return Err(CompileError::new(format!("<kernel>:1:1: error: '{bad}' does not compile")));
        }

        Ok(entry_points
            .into_iter()
            .map(|ep| {
                let binary = MockBinary {
                    entry_point: ep.clone(),
                    invocation,
                };
                (ep, Arc::new(binary) as KernelHandle)
            })
            .collect())
    }
}

pub fn add_kernel_source(index: usize) -> KernelSource {
    let entry = format!("add_kernel_{index}");
    let code = format!(
        "__kernel void {entry}(__global const float* a, __global const float* b, __global float* out) {{\n    \
         const int gid = get_global_id(0);\n    out[gid] = a[gid] + b[gid] + {index}.0f;\n}}\n"
    );
    KernelSource::new(code, "-cl-mad-enable", entry)
}

pub fn ids(kernels: &[kernels_cache::CompiledKernel]) -> Vec<String> {
    kernels.iter().map(|k| k.id().to_owned()).collect()
}
