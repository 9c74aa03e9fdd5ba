#![cfg(test)]

use super::*;
use crate::KernelSource;

#[test]
fn equal_source_gives_equal_key() {
    let a = KernelKey::of("__kernel void k() {}", "-cl-mad-enable", "k");
    let b = KernelKey::of("__kernel void k() {}", "-cl-mad-enable", "k");
    assert_eq!(a, b);
    assert_eq!(a.hash_value(), b.hash_value());
}

#[test]
fn every_field_participates() {
    let base = KernelKey::of("code", "-O2", "k");
    assert_ne!(base, KernelKey::of("code2", "-O2", "k"));
    assert_ne!(base, KernelKey::of("code", "-O3", "k"));
    assert_ne!(base, KernelKey::of("code", "-O2", "k2"));
}

#[test]
fn field_boundaries_do_not_alias() {
    let a = KernelKey::of("ab", "c", "k");
    let b = KernelKey::of("a", "bc", "k");
    assert_ne!(a.hash_value(), b.hash_value());
}

#[test]
fn batchable_flag_is_not_part_of_identity() {
    let shared = KernelSource::new("src", "", "main");
    let isolated = shared.clone().isolated();
    assert_eq!(shared.key(), isolated.key());
    assert!(shared.is_equivalent(&isolated));
}

#[test]
fn display_is_entry_point_at_hash() {
    let key = KernelKey::of("src", "", "add_kernel_0");
    let shown = key.to_string();
    assert!(shown.starts_with("add_kernel_0@"), "{shown}");
    assert_eq!(shown.len(), "add_kernel_0@".len() + 16);
}

#[test]
fn colliding_digest_does_not_merge_kernels() {
    let a = KernelKey::with_forced_hash(0xfeed, "__kernel void k() { a(); }", "", "k");
    let b = KernelKey::with_forced_hash(0xfeed, "__kernel void k() { b(); }", "", "k");
    assert_eq!(a.hash_value(), b.hash_value());
    assert_ne!(a, b);

    let c = KernelKey::with_forced_hash(0xfeed, "__kernel void k() { a(); }", "-O2", "k");
    assert_ne!(a, c);
}
