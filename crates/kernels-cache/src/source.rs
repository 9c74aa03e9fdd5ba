use crate::key::KernelKey;

/// One unit of kernel source as handed in by a graph node.
///
/// Equivalence (and therefore the [`KernelKey`]) covers `code`, `build_options`
/// and `entry_point`. `batchable` only steers how the unit is grouped for
/// compilation.
#[derive(Clone, Debug)]
pub struct KernelSource {
    pub code: String,
    pub build_options: String,
    pub entry_point: String,
    pub batchable: bool,
}

impl KernelSource {
    /// A batchable source unit.
    pub fn new(code: impl Into<String>, build_options: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            build_options: build_options.into(),
            entry_point: entry_point.into(),
            batchable: true,
        }
    }

    /// Mark the unit as requiring a compiler invocation of its own.
    #[must_use]
    pub fn isolated(mut self) -> Self {
        self.batchable = false;
        self
    }

    #[inline]
    pub fn key(&self) -> KernelKey {
        KernelKey::of(&self.code, &self.build_options, &self.entry_point)
    }

    #[inline]
    pub fn source_len(&self) -> usize {
        self.code.len()
    }

    pub fn is_equivalent(&self, other: &KernelSource) -> bool {
        self.code == other.code && self.build_options == other.build_options && self.entry_point == other.entry_point
    }
}
