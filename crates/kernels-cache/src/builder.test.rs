#![cfg(test)]

use std::sync::atomic::AtomicUsize;

use super::*;
use crate::{
    CompileError, InlineExecutor, KernelHandle, KernelSource, RequestId, request_index::RequestIndex
};

fn compiler<F>(f: F) -> Arc<dyn DeviceCompiler>
where
    F: Fn(&str, &Batch) -> Result<CompiledProgram, CompileError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn compile_everything(_target: &str, batch: &Batch) -> Result<CompiledProgram, CompileError> {
    Ok(batch
        .entry_points()
        .map(|ep| (ep.to_owned(), Arc::new(ep.to_owned()) as KernelHandle))
        .collect())
}

struct Fixture {
    cache: Arc<DedupCache>,
    stats: Arc<CacheStats>,
    registry: SourceRegistry,
}

fn fixture() -> Fixture {
    let cache = Arc::new(DedupCache::new());
    let stats = Arc::new(CacheStats::default());
    let registry = SourceRegistry::new(Arc::clone(&cache), Arc::new(RequestIndex::new()), Arc::clone(&stats));
    Fixture { cache, stats, registry }
}

impl Fixture {
    fn builder(&self, compiler: Arc<dyn DeviceCompiler>, max_kernels: usize) -> BatchBuilder {
        BatchBuilder::new(
            compiler,
            Arc::new(InlineExecutor),
            Arc::clone(&self.cache),
            Arc::clone(&self.stats),
            BatchLimits::new(max_kernels, usize::MAX),
            "test-device",
        )
    }
}

fn source(entry: &str) -> KernelSource {
    KernelSource::new(format!("__kernel void {entry}() {{}}"), "-cl-mad-enable", entry)
}

fn add(f: &Fixture, request: &'static str, entries: &[&str]) {
    f.registry.add(RequestId::from(request), entries.iter().map(|e| source(e)), false);
}

#[test]
fn empty_queue_is_a_noop() {
    let f = fixture();
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let builder = f.builder(
        compiler(move |t, b| {
            counted.fetch_add(1, Ordering::SeqCst);
            compile_everything(t, b)
        }),
        4,
    );

    assert_eq!(builder.build_all(&f.registry).expect("build"), BuildReport::default());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn compiles_each_batch_once_and_caches_every_entry_point() {
    let f = fixture();
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let builder = f.builder(
        compiler(move |t, b| {
            counted.fetch_add(1, Ordering::SeqCst);
            assert_eq!(t, "test-device");
            compile_everything(t, b)
        }),
        2,
    );
    add(&f, "r", &["a", "b", "c"]);

    let report = builder.build_all(&f.registry).expect("build");
    assert_eq!(
        report,
        BuildReport {
            batches: 2,
            kernels_compiled: 3,
            kernels_discarded: 0
        }
    );
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(f.cache.len(), 3);
    assert_eq!(f.registry.pending_len(), 0);

    // Drained: a second build has nothing to do.
    assert_eq!(builder.build_all(&f.registry).expect("rebuild").batches, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn failing_batch_does_not_affect_others() {
    let f = fixture();
    let builder = f.builder(
        compiler(|t, b| {
            if b.contains_entry_point("broken") {
                Err(CompileError::new("error: use of undeclared identifier 'x'\n"))
            } else {
                compile_everything(t, b)
            }
        }),
        2,
    );
    add(&f, "r", &["ok_0", "ok_1", "broken", "ok_2"]);

    let err = builder.build_all(&f.registry).unwrap_err();
    let failures = err.compile_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].batch_id, 1);
    assert_eq!(failures[0].entry_points, vec!["broken".to_string(), "ok_2".to_string()]);
    assert_eq!(failures[0].build_options, "-cl-mad-enable");
    assert!(failures[0].diagnostics.contains("undeclared identifier"));

    assert!(f.cache.contains(&source("ok_0").key()));
    assert!(f.cache.contains(&source("ok_1").key()));
    assert!(!f.cache.contains(&source("broken").key()));

    let stats = f.stats.snapshot();
    assert_eq!(stats.batches_compiled, 1);
    assert_eq!(stats.batches_failed, 1);
}

#[test]
fn missing_entry_point_fails_only_that_entry_point() {
    let f = fixture();
    let builder = f.builder(
        compiler(|t, b| {
            let mut program = compile_everything(t, b)?;
            program.remove("dropped");
            Ok(program)
        }),
        8,
    );
    add(&f, "r", &["kept", "dropped"]);

    let err = builder.build_all(&f.registry).unwrap_err();
    let failures = err.compile_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].entry_points, vec!["dropped".to_string()]);
    assert!(f.cache.contains(&source("kept").key()));
    assert!(!f.cache.contains(&source("dropped").key()));
}

#[test]
fn compiler_panic_is_reported_as_failure() {
    let f = fixture();
    let builder = f.builder(
        compiler(|t, b| {
            if b.contains_entry_point("boom") {
                panic!("driver crashed");
            }
            compile_everything(t, b)
        }),
        1,
    );
    add(&f, "r", &["fine", "boom"]);

    let err = builder.build_all(&f.registry).unwrap_err();
    let failures = err.compile_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].entry_points, vec!["boom".to_string()]);
    assert!(failures[0].diagnostics.contains("driver crashed"));
    assert!(f.cache.contains(&source("fine").key()));
}

#[test]
fn already_cached_result_is_discarded() {
    let f = fixture();
    let builder = f.builder(compiler(compile_everything), 8);
    add(&f, "r", &["k"]);

    // Someone else publishes the same content while it is still pending.
    let external = CompiledKernel::new(source("k"), Arc::new(0u8) as KernelHandle);
    f.cache.register_external(external.clone());

    let report = builder.build_all(&f.registry).expect("build");
    assert_eq!(report.kernels_compiled, 0);
    assert_eq!(report.kernels_discarded, 1);
    let stored = f.cache.get(&source("k").key()).expect("cached");
    assert!(stored.same_instance(&external));
}

fn dumped_names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read dump dir")
        .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn dumps_batch_sources_when_configured() {
    let f = fixture();
    let dir = tempfile::tempdir().expect("tempdir");
    let builder = f
        .builder(compiler(compile_everything), 2)
        .with_dump_dir(Some(dir.path().to_path_buf()));
    add(&f, "r", &["a", "b", "c"]);

    builder.build_all(&f.registry).expect("build");
    let names = dumped_names(dir.path());
    assert_eq!(names.len(), 2);
    assert!(names[0].ends_with("_c0_b0.cl"), "{names:?}");
    assert!(names[1].ends_with("_c0_b1.cl"), "{names:?}");

    add(&f, "r", &["d"]);
    builder.build_all(&f.registry).expect("build");
    let names = dumped_names(dir.path());
    assert_eq!(names.len(), 3);
    assert!(names.iter().any(|n| n.ends_with("_c1_b0.cl")), "{names:?}");
}

#[test]
fn builders_sharing_a_dump_dir_keep_their_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    for _ in 0..2 {
        let f = fixture();
        let builder = f
            .builder(compiler(compile_everything), 8)
            .with_dump_dir(Some(dir.path().to_path_buf()));
        add(&f, "r", &["a"]);
        builder.build_all(&f.registry).expect("build");
    }
    assert_eq!(dumped_names(dir.path()).len(), 2);
}
