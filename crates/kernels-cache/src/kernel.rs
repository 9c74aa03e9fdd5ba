use std::{any::Any, fmt, sync::Arc};

use crate::{key::KernelKey, source::KernelSource};

/// Opaque executable object produced by a device compiler.
pub type KernelHandle = Arc<dyn Any + Send + Sync>;

/// A compiled kernel: the compiler's handle plus the source it was built from.
///
/// Cloning is cheap and shares the handle. The id is the entry point; the
/// [`KernelKey`] is recomputed from the carried source, which is what lets
/// externally built kernels be matched by content.
#[derive(Clone)]
pub struct CompiledKernel {
    source: Arc<KernelSource>,
    key: KernelKey,
    handle: KernelHandle,
}

impl CompiledKernel {
    pub fn new(source: impl Into<Arc<KernelSource>>, handle: KernelHandle) -> Self {
        let source = source.into();
        let key = source.key();
        Self { source, key, handle }
    }

    pub(crate) fn from_parts(source: Arc<KernelSource>, key: KernelKey, handle: KernelHandle) -> Self {
        debug_assert_eq!(key, source.key());
        Self { source, key, handle }
    }

    /// Identifying string; always the entry point.
    #[inline]
    pub fn id(&self) -> &str {
        &self.source.entry_point
    }

    #[inline]
    pub fn key(&self) -> &KernelKey {
        &self.key
    }

    #[inline]
    pub fn source(&self) -> &KernelSource {
        &self.source
    }

    #[inline]
    pub fn handle(&self) -> &KernelHandle {
        &self.handle
    }

    /// Borrow the handle as the compiler's concrete type.
    pub fn downcast_handle<T: Any>(&self) -> Option<&T> {
        self.handle.downcast_ref::<T>()
    }

    /// True when both values share one compiled handle.
    pub fn same_instance(&self, other: &CompiledKernel) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.handle), Arc::as_ptr(&other.handle))
    }
}

impl fmt::Debug for CompiledKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledKernel")
            .field("id", &self.id())
            .field("key", &self.key)
            .field("build_options", &self.source.build_options)
            .finish_non_exhaustive()
    }
}
