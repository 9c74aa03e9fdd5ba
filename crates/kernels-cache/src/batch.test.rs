#![cfg(test)]

use super::*;

fn pending(entry: &str, options: &str) -> PendingKernel {
    pending_in(entry, options, BatchGroup::Shared)
}

fn pending_in(entry: &str, options: &str, group: BatchGroup) -> PendingKernel {
    let code = format!("__kernel void {entry}(__global float* out) {{ out[0] = 1.0f; }}");
    PendingKernel::new(Arc::new(KernelSource::new(code, options, entry)), group)
}

fn entry_points(batch: &Batch) -> Vec<&str> {
    batch.entry_points().collect()
}

#[test]
fn splits_by_kernel_count() {
    let pending = (0..9).map(|i| pending(&format!("add_kernel_{i}"), "-cl-mad-enable")).collect();
    let batches = partition(pending, BatchLimits::new(4, usize::MAX));

    let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
    assert_eq!(sizes, vec![4, 4, 1]);
    assert_eq!(entry_points(&batches[0]), ["add_kernel_0", "add_kernel_1", "add_kernel_2", "add_kernel_3"]);
    assert_eq!(entry_points(&batches[2]), ["add_kernel_8"]);
}

#[test]
fn ids_follow_creation_order() {
    let pending = (0..5).map(|i| pending(&format!("k{i}"), "")).collect();
    let batches = partition(pending, BatchLimits::new(2, usize::MAX));
    let ids: Vec<usize> = batches.iter().map(Batch::id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[test]
fn non_batchable_units_are_isolated() {
    let mut isolated = pending("solo", "");
    isolated.source = Arc::new(KernelSource::clone(&isolated.source).isolated());
    let pending = vec![pending("a", ""), isolated, pending("b", "")];

    let batches = partition(pending, BatchLimits::new(8, usize::MAX));
    assert_eq!(batches.len(), 2);
    assert_eq!(entry_points(&batches[0]), ["a", "b"]);
    assert_eq!(entry_points(&batches[1]), ["solo"]);
    assert!(batches[0].is_batchable());
    assert!(!batches[1].is_batchable());
}

#[test]
fn build_options_never_mix() {
    let pending = vec![pending("a", "-O1"), pending("b", "-O2"), pending("c", "-O1")];
    let batches = partition(pending, BatchLimits::new(8, usize::MAX));
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].build_options(), "-O1");
    assert_eq!(entry_points(&batches[0]), ["a", "c"]);
    assert_eq!(batches[1].build_options(), "-O2");
}

#[test]
fn byte_budget_closes_batch() {
    let a = pending("a", "");
    let per_unit = a.source.source_len();
    let pending = vec![a, pending("b", ""), pending("c", "")];

    let batches = partition(pending, BatchLimits::new(8, per_unit * 2));
    let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
    assert_eq!(sizes, vec![2, 1]);
    assert!(batches.iter().all(|b| b.source_bytes() <= per_unit * 2));
}

#[test]
fn oversized_unit_still_gets_a_batch() {
    let batches = partition(vec![pending("huge", ""), pending("next", "")], BatchLimits::new(8, 4));
    assert_eq!(batches.len(), 2);
    assert_eq!(entry_points(&batches[0]), ["huge"]);
    assert_eq!(entry_points(&batches[1]), ["next"]);
}

#[test]
fn duplicate_entry_point_opens_new_batch() {
    let first = pending("main", "");
    let second = PendingKernel::new(Arc::new(KernelSource::new("different body", "", "main")), BatchGroup::Shared);
    assert_ne!(first.key, second.key);

    let batches = partition(vec![first, second], BatchLimits::new(8, usize::MAX));
    assert_eq!(batches.len(), 2);
}

#[test]
fn private_groups_are_not_merged() {
    let pending = vec![
        pending_in("shared_a", "", BatchGroup::Shared),
        pending_in("forced_a", "", BatchGroup::Private(1)),
        pending_in("forced_b", "", BatchGroup::Private(1)),
        pending_in("other_forced", "", BatchGroup::Private(2)),
        pending_in("shared_b", "", BatchGroup::Shared),
    ];

    let batches = partition(pending, BatchLimits::new(8, usize::MAX));
    let groups: Vec<Vec<&str>> = batches.iter().map(entry_points).collect();
    assert_eq!(groups, vec![vec!["shared_a", "shared_b"], vec!["forced_a", "forced_b"], vec!["other_forced"]]);
}

#[test]
fn limits_are_clamped() {
    let limits = BatchLimits::new(0, 0);
    assert_eq!(limits.max_kernels, 1);
    assert_eq!(limits.max_source_bytes, 1);
}

#[test]
fn combined_source_keeps_batch_order() {
    let batches = partition(vec![pending("first", ""), pending("second", "")], BatchLimits::new(8, usize::MAX));
    let text = batches[0].combined_source();
    let first = text.find("void first").expect("first kernel present");
    let second = text.find("void second").expect("second kernel present");
    assert!(first < second);
    assert!(text.starts_with("// entry point: first\n"));
}
