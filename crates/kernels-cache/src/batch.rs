//! Grouping of pending kernel sources into compiler invocations.
//!
//! Everything here is pure: [`partition`] takes the drained pending queue and
//! returns the batches to compile, so the grouping rules can be tested without
//! a device compiler.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::{key::KernelKey, source::KernelSource};

/// Which units may share a batch.
///
/// Units queued with `force_new_batch` get a private group per `add` call and
/// are never merged with units of any other call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BatchGroup {
    Shared,
    Private(u64),
}

/// A source unit waiting for compilation.
#[derive(Clone, Debug)]
pub struct PendingKernel {
    pub key: KernelKey,
    pub source: Arc<KernelSource>,
    pub group: BatchGroup,
}

impl PendingKernel {
    pub fn new(source: Arc<KernelSource>, group: BatchGroup) -> Self {
        Self {
            key: source.key(),
            source,
            group,
        }
    }
}

/// Bounds applied to every batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_kernels: usize,
    pub max_source_bytes: usize,
}

impl BatchLimits {
    /// Both bounds are clamped to at least 1.
    pub fn new(max_kernels: usize, max_source_bytes: usize) -> Self {
        Self {
            max_kernels: max_kernels.max(1),
            max_source_bytes: max_source_bytes.max(1),
        }
    }
}

/// An ordered group of sources compiled by one compiler invocation.
#[derive(Clone, Debug)]
pub struct Batch {
    id: usize,
    build_options: String,
    batchable: bool,
    kernels: Vec<PendingKernel>,
    source_bytes: usize,
}

impl Batch {
    fn open(id: usize, first: PendingKernel) -> Self {
        Self {
            id,
            build_options: first.source.build_options.clone(),
            batchable: first.source.batchable,
            source_bytes: first.source.source_len(),
            kernels: vec![first],
        }
    }

    fn accepts(&self, kernel: &PendingKernel, limits: &BatchLimits) -> bool {
        self.kernels.len() < limits.max_kernels
            && self.source_bytes + kernel.source.source_len() <= limits.max_source_bytes
            && !self.contains_entry_point(&kernel.source.entry_point)
    }

    fn push(&mut self, kernel: PendingKernel) {
        self.source_bytes += kernel.source.source_len();
        self.kernels.push(kernel);
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn build_options(&self) -> &str {
        &self.build_options
    }

    #[inline]
    pub fn is_batchable(&self) -> bool {
        self.batchable
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    #[inline]
    pub fn source_bytes(&self) -> usize {
        self.source_bytes
    }

    pub fn kernels(&self) -> &[PendingKernel] {
        &self.kernels
    }

    pub fn sources(&self) -> impl Iterator<Item = &KernelSource> {
        self.kernels.iter().map(|k| k.source.as_ref())
    }

    pub fn entry_points(&self) -> impl Iterator<Item = &str> {
        self.kernels.iter().map(|k| k.source.entry_point.as_str())
    }

    pub fn contains_entry_point(&self, entry_point: &str) -> bool {
        self.entry_points().any(|ep| ep == entry_point)
    }

    /// All sources of the batch joined into one program text, in batch order.
    pub fn combined_source(&self) -> String {
        let mut out = String::with_capacity(self.source_bytes + self.kernels.len() * 48);
        for kernel in &self.kernels {
            out.push_str("// entry point: ");
            out.push_str(&kernel.source.entry_point);
            out.push('\n');
            out.push_str(&kernel.source.code);
            if !kernel.source.code.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

/// Split `pending` (in queue order) into batches.
///
/// - non-batchable units get a batch of their own;
/// - batchable units join the open batch of their `(group, build_options)`
///   bucket until it is full by count, would overflow the byte budget, or
///   already holds the same entry point;
/// - a unit bigger than the byte budget still compiles, alone.
///
/// Batch ids follow creation order starting at 0.
pub fn partition(pending: Vec<PendingKernel>, limits: BatchLimits) -> Vec<Batch> {
    let mut batches: Vec<Batch> = Vec::new();
    let mut open: FxHashMap<(BatchGroup, String), usize> = FxHashMap::default();

    for kernel in pending {
        if !kernel.source.batchable {
            let id = batches.len();
            batches.push(Batch::open(id, kernel));
            continue;
        }

        let bucket = (kernel.group, kernel.source.build_options.clone());
        match open.get(&bucket).copied() {
            Some(idx) if batches[idx].accepts(&kernel, &limits) => batches[idx].push(kernel),
            _ => {
                let id = batches.len();
                batches.push(Batch::open(id, kernel));
                open.insert(bucket, id);
            }
        }
    }

    tracing::trace!(
        target: "kernels_cache::batch",
        batches = batches.len(),
        max_kernels = limits.max_kernels,
        max_source_bytes = limits.max_source_bytes,
        "partitioned pending kernels"
    );

    batches
}

#[path = "batch.test.rs"]
mod tests;
