//! Compilation of the pending queue.
//!
//! [`BatchBuilder::build_all`] drains the registry, partitions the drained
//! units into batches and hands one task per batch to the executor. Each task
//! calls the device compiler and publishes what it produced through the
//! first-writer-wins [`DedupCache::put`]. Failures are gathered per batch.

use std::{
    any::Any, panic::{self, AssertUnwindSafe}, path::PathBuf, sync::{
        Arc, Mutex, PoisonError, atomic::{AtomicU64, Ordering}
    }, time::Instant
};

use crate::{
    batch::{Batch, BatchLimits, partition}, compiler::{CompiledProgram, DeviceCompiler}, dedup::DedupCache, dump::dump_batch_source, error::{CompileFailure, KernelsCacheError}, executor::{Task, TaskExecutor}, instrument::CacheStats, kernel::CompiledKernel, registry::SourceRegistry
};

/// Totals of one successful `build_all`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Batches submitted to the compiler.
    pub batches: usize,
    /// Kernels newly written to the cache.
    pub kernels_compiled: usize,
    /// Kernels compiled but dropped because an equal one was already cached.
    pub kernels_discarded: usize,
}

#[derive(Default)]
struct BatchOutcome {
    inserted: usize,
    discarded: usize,
    failure: Option<CompileFailure>,
}

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(0);

pub struct BatchBuilder {
    compiler: Arc<dyn DeviceCompiler>,
    executor: Arc<dyn TaskExecutor>,
    cache: Arc<DedupCache>,
    stats: Arc<CacheStats>,
    limits: BatchLimits,
    target: String,
    dump_dir: Option<PathBuf>,
    instance: u64,
    cycle: AtomicU64,
    build_lock: Mutex<()>,
}

impl BatchBuilder {
    pub fn new(
        compiler: Arc<dyn DeviceCompiler>,
        executor: Arc<dyn TaskExecutor>,
        cache: Arc<DedupCache>,
        stats: Arc<CacheStats>,
        limits: BatchLimits,
        target: impl Into<String>,
    ) -> Self {
        Self {
            compiler,
            executor,
            cache,
            stats,
            limits,
            target: target.into(),
            dump_dir: None,
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            cycle: AtomicU64::new(0),
            build_lock: Mutex::new(()),
        }
    }

    /// Write each batch's combined source under `dir` before compiling it.
    #[must_use]
    pub fn with_dump_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.dump_dir = dir;
        self
    }

    /// Compile everything pending in `registry` and block until all batches finish.
    ///
    /// Calls are serialized: a second caller waits for the first build, then
    /// compiles whatever was queued meanwhile. With nothing pending this is a
    /// no-op returning an empty report.
    pub fn build_all(&self, registry: &SourceRegistry) -> Result<BuildReport, KernelsCacheError> {
        let _build = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let pending = registry.drain_pending();
        if pending.is_empty() {
            tracing::trace!(target: "kernels_cache::build", "nothing pending");
            return Ok(BuildReport::default());
        }

        let cycle = self.cycle.fetch_add(1, Ordering::Relaxed);
        let kernels = pending.len();
        let batches = partition(pending, self.limits);
        let start = Instant::now();

        tracing::debug!(
            target: "kernels_cache::build",
            cycle,
            kernels,
            batches = batches.len(),
            streams = self.executor.parallelism(),
            "starting build"
        );

        let outcomes: Mutex<Vec<BatchOutcome>> = Mutex::new(Vec::with_capacity(batches.len()));
        let tasks: Vec<Task<'_>> = batches
            .iter()
            .map(|batch| {
                let outcomes = &outcomes;
                Box::new(move || {
                    let outcome = self.compile_batch(cycle, batch);
                    outcomes.lock().unwrap_or_else(PoisonError::into_inner).push(outcome);
                }) as Task<'_>
            })
            .collect();
        self.executor.run_all(tasks);

        let outcomes = outcomes.into_inner().unwrap_or_else(PoisonError::into_inner);
        let mut report = BuildReport {
            batches: batches.len(),
            ..BuildReport::default()
        };
        let mut failures = Vec::new();
        for outcome in outcomes {
            report.kernels_compiled += outcome.inserted;
            report.kernels_discarded += outcome.discarded;
            failures.extend(outcome.failure);
        }

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        if failures.is_empty() {
            tracing::info!(
                target: "kernels_cache::build",
                cycle,
                batches = report.batches,
                compiled = report.kernels_compiled,
                discarded = report.kernels_discarded,
                elapsed_ms,
                "build finished"
            );
            Ok(report)
        } else {
            failures.sort_by_key(|f| f.batch_id);
            tracing::warn!(
                target: "kernels_cache::build",
                cycle,
                batches = report.batches,
                failed = failures.len(),
                compiled = report.kernels_compiled,
                elapsed_ms,
                "build finished with failures"
            );
            Err(KernelsCacheError::BuildFailed(failures))
        }
    }

    fn compile_batch(&self, cycle: u64, batch: &Batch) -> BatchOutcome {
        if let Some(dir) = &self.dump_dir {
            match dump_batch_source(dir, self.instance, cycle, &self.target, batch) {
                Ok(path) => tracing::debug!(target: "kernels_cache::build", batch = batch.id(), path = %path.display(), "dumped batch source"),
                Err(e) => tracing::warn!(target: "kernels_cache::build", batch = batch.id(), error = %e, "failed to dump batch source"),
            }
        }

        let start = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.compiler.compile(&self.target, batch)));
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let outcome = match result {
            Ok(Ok(program)) => self.publish(batch, program),
            Ok(Err(e)) => BatchOutcome {
                failure: Some(failure(batch, batch.entry_points().map(str::to_owned).collect(), e.log)),
                ..BatchOutcome::default()
            },
            Err(payload) => BatchOutcome {
                failure: Some(failure(
                    batch,
                    batch.entry_points().map(str::to_owned).collect(),
                    format!("compiler panicked: {}", panic_message(payload.as_ref())),
                )),
                ..BatchOutcome::default()
            },
        };

        self.stats
            .record_batch(outcome.failure.is_none(), outcome.inserted, outcome.discarded);

        match &outcome.failure {
            None => tracing::debug!(
                target: "kernels_cache::build",
                batch = batch.id(),
                kernels = batch.len(),
                inserted = outcome.inserted,
                discarded = outcome.discarded,
                elapsed_ms,
                "batch compiled"
            ),
            Some(f) => tracing::warn!(
                target: "kernels_cache::build",
                batch = batch.id(),
                entry_points = ?f.entry_points,
                elapsed_ms,
                diagnostics = %f.diagnostics.trim_end(),
                "batch failed to compile"
            ),
        }
        outcome
    }

    /// Write every produced kernel to the cache; entry points the compiler left
    /// out become this batch's failure.
    fn publish(&self, batch: &Batch, mut program: CompiledProgram) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut missing = Vec::new();

        for pending in batch.kernels() {
            let Some(handle) = program.remove(&pending.source.entry_point) else {
                missing.push(pending.source.entry_point.clone());
                continue;
            };
            let kernel = CompiledKernel::from_parts(Arc::clone(&pending.source), pending.key.clone(), handle);
            if self.cache.put(pending.key.clone(), kernel) {
                outcome.inserted += 1;
            } else {
                outcome.discarded += 1;
                tracing::trace!(target: "kernels_cache::build", key = %pending.key, "already cached, discarding");
            }
        }

        if !program.is_empty() {
            tracing::debug!(
                target: "kernels_cache::build",
                batch = batch.id(),
                extra = ?program.keys().collect::<Vec<_>>(),
                "compiler returned handles for unknown entry points"
            );
        }

        if !missing.is_empty() {
            let log = format!("compiler output has no handle for: {}", missing.join(", "));
            outcome.failure = Some(failure(batch, missing, log));
        }
        outcome
    }
}

fn failure(batch: &Batch, entry_points: Vec<String>, diagnostics: String) -> CompileFailure {
    CompileFailure {
        batch_id: batch.id(),
        build_options: batch.build_options().to_owned(),
        entry_points,
        diagnostics,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[path = "builder.test.rs"]
mod tests;
