mod common;

use std::{
    sync::{
        Arc, Barrier, Mutex, atomic::{AtomicBool, AtomicUsize, Ordering}, mpsc::{self, Receiver, Sender}
    }, thread, time::Duration
};

use common::{RecordingCompiler, add_kernel_source, ids};
use kernels_cache::{
    Batch, CompileError, CompiledProgram, DeviceCompiler, KernelHandle, KernelsCache, KernelsCacheConfig
};

/// Holds its first compile call until released, and tracks how many calls overlap.
struct GatedCompiler {
    gated: AtomicBool,
    started: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    invocations: AtomicUsize,
}

impl GatedCompiler {
    fn new() -> (Arc<Self>, Receiver<()>, Sender<()>) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let compiler = Arc::new(Self {
            gated: AtomicBool::new(true),
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            invocations: AtomicUsize::new(0),
        });
        (compiler, started_rx, release_tx)
    }
}

impl DeviceCompiler for GatedCompiler {
    fn compile(&self, _target: &str, batch: &Batch) -> Result<CompiledProgram, CompileError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if self.gated.swap(false, Ordering::SeqCst) {
            self.started.lock().expect("started lock").send(()).expect("test is waiting");
            self.release.lock().expect("release lock").recv().expect("test releases the gate");
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(batch
            .entry_points()
            .map(|ep| (ep.to_owned(), Arc::new(ep.to_owned()) as KernelHandle))
            .collect())
    }
}

#[test]
fn source_requeued_during_build_is_compiled_once_more_and_discarded() {
    let (compiler, started, release) = GatedCompiler::new();
    let cache = Arc::new(KernelsCache::new(KernelsCacheConfig::default().with_streams(2), compiler.clone()).expect("cache"));

    cache.add_kernels_source("a", [add_kernel_source(0)], false);
    let first_build = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || cache.build_all())
    };
    started.recv().expect("first build reached the compiler");

    // The first build drained the queue but has not published yet.
    let summary = cache.add_kernels_source("b", [add_kernel_source(0)], false);
    assert_eq!(summary.queued, 1);
    assert_eq!(summary.cached, 0);

    let second_build = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || cache.build_all())
    };
    thread::sleep(Duration::from_millis(20));
    release.send(()).expect("release gate");

    let first = first_build.join().expect("first build thread").expect("first build");
    let second = second_build.join().expect("second build thread").expect("second build");
    assert_eq!((first.kernels_compiled, first.kernels_discarded), (1, 0));
    assert_eq!((second.kernels_compiled, second.kernels_discarded), (0, 1));
    assert_eq!(compiler.invocations.load(Ordering::SeqCst), 2);
    assert_eq!(compiler.peak.load(Ordering::SeqCst), 1, "builds overlapped");

    let a = cache.get_kernels("a").expect("a");
    let b = cache.get_kernels("b").expect("b");
    assert!(a[0].same_instance(&b[0]));
    assert_eq!(cache.stats().kernels_discarded, 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn concurrent_add_build_get_keeps_each_request_ordered() {
    const NODES: usize = 6;
    let compiler = Arc::new(RecordingCompiler::new().delaying_first_batch(Duration::from_millis(10)));
    let cache = Arc::new(
        KernelsCache::new(
            KernelsCacheConfig::default()
                .with_streams(2)
                .with_max_kernels_per_batch(3),
            compiler,
        )
        .expect("cache"),
    );
    let barrier = Arc::new(Barrier::new(NODES));

    let handles: Vec<_> = (0..NODES)
        .map(|node| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                // Overlapping, reversed ranges: every node shares some kernels with its neighbours.
                let order: Vec<usize> = (node..node + 4).rev().collect();
                barrier.wait();
                cache.add_kernels_source(node, order.iter().map(|&i| add_kernel_source(i)), false);
                cache.build_all().expect("build");
                let got = ids(&cache.get_kernels(node).expect("kernels"));
                let expected: Vec<String> = order.iter().map(|i| format!("add_kernel_{i}")).collect();
                assert_eq!(got, expected, "node {node}");
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("node thread");
    }

    assert_eq!(cache.len(), (NODES + 3) as u64);
    assert_eq!(cache.pending_len(), 0);
}
