#![cfg(test)]

use std::sync::Arc;

use super::*;
use crate::{BatchLimits, KernelSource, batch::{BatchGroup, PendingKernel, partition}};

#[test]
fn writes_header_and_sources() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pending = ["k0", "k1"]
        .into_iter()
        .map(|ep| PendingKernel::new(Arc::new(KernelSource::new(format!("void {ep}() {{}}"), "-O2", ep)), BatchGroup::Shared))
        .collect();
    let batches = partition(pending, BatchLimits::new(8, usize::MAX));

    let path = dump_batch_source(&dir.path().join("nested"), 5, 3, "gpu.0", &batches[0]).expect("dump");
    let expected = format!("kernels_cache_p{}_i5_c3_b0.cl", std::process::id());
    assert_eq!(path.file_name().and_then(|n| n.to_str()), Some(expected.as_str()));

    let text = std::fs::read_to_string(&path).expect("read back");
    assert!(text.contains("// target: gpu.0"));
    assert!(text.contains("// build options: -O2"));
    assert!(text.contains("// entry points: k0, k1"));
    assert!(text.contains("void k1() {}"));
}

#[test]
fn unwritable_dir_is_a_dump_error() {
    let file = tempfile::NamedTempFile::new().expect("temp file");
    let pending = vec![PendingKernel::new(Arc::new(KernelSource::new("void k() {}", "", "k")), BatchGroup::Shared)];
    let batches = partition(pending, BatchLimits::new(1, usize::MAX));

    // A regular file cannot be used as a directory.
    let err = dump_batch_source(file.path(), 0, 0, "t", &batches[0]).unwrap_err();
    assert!(matches!(err, KernelsCacheError::Dump(_)));
}

#[test]
fn instances_sharing_a_dir_do_not_collide() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pending = vec![PendingKernel::new(Arc::new(KernelSource::new("void k() {}", "", "k")), BatchGroup::Shared)];
    let batches = partition(pending, BatchLimits::new(1, usize::MAX));

    let first = dump_batch_source(dir.path(), 0, 0, "t", &batches[0]).expect("first dump");
    let second = dump_batch_source(dir.path(), 1, 0, "t", &batches[0]).expect("second dump");
    assert_ne!(first, second);
    assert!(first.is_file() && second.is_file());
}
