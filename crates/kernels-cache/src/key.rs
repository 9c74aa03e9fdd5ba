//! Content-derived kernel identity.

use std::{
    fmt, hash::{Hash, Hasher}, sync::Arc
};

use rustc_hash::FxHasher;

/// Stable identity of a kernel source unit.
///
/// Derived only from `(code, build_options, entry_point)`; two units with equal
/// text always map to the same key, regardless of which request submitted them
/// or whether the kernel was built here or registered from outside.
///
/// The FxHash digest is only a fast path: equality also compares the full
/// text, so colliding digests never merge different kernels.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct KernelKey {
    hash: u64,
    entry_point: Arc<str>,
    content: Arc<KeyContent>,
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct KeyContent {
    code: Box<str>,
    build_options: Box<str>,
}

impl KernelKey {
    pub fn of(code: &str, build_options: &str, entry_point: &str) -> Self {
        // `str::hash` appends a terminator byte, so field boundaries cannot shift
        // between ("ab", "c") and ("a", "bc").
        let mut hasher = FxHasher::default();
        code.hash(&mut hasher);
        build_options.hash(&mut hasher);
        entry_point.hash(&mut hasher);

        Self::with_hash(hasher.finish(), code, build_options, entry_point)
    }

    fn with_hash(hash: u64, code: &str, build_options: &str, entry_point: &str) -> Self {
        Self {
            hash,
            entry_point: Arc::from(entry_point),
            content: Arc::new(KeyContent {
                code: code.into(),
                build_options: build_options.into(),
            }),
        }
    }

    /// Key with a chosen digest, for exercising hash collisions.
    #[cfg(test)]
    pub(crate) fn with_forced_hash(hash: u64, code: &str, build_options: &str, entry_point: &str) -> Self {
        Self::with_hash(hash, code, build_options, entry_point)
    }

    #[inline]
    pub fn hash_value(&self) -> u64 {
        self.hash
    }

    #[inline]
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}

impl Hash for KernelKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Equal keys share a digest; the text is compared only on lookup.
        state.write_u64(self.hash);
    }
}

impl fmt::Display for KernelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:016x}", self.entry_point, self.hash)
    }
}

impl fmt::Debug for KernelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KernelKey({self})")
    }
}

#[path = "key.test.rs"]
mod tests;
