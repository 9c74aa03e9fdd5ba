//! Deduplicating, batching compile cache for GPU kernels.
//!
//! Graph nodes register kernel sources under a request id. Sources with equal
//! content ([`KernelKey`]) are compiled once, grouped into batches that run on
//! a bounded pool of compile streams, and handed back per request in the order
//! they were added. See [`KernelsCache`].

pub mod batch;
pub mod builder;
pub mod cache_config;
pub mod compiler;
pub mod dedup;
pub mod dump;
pub mod error;
pub mod executor;
pub mod instrument;
pub mod kernel;
pub mod kernels_cache;
pub mod key;
pub mod registry;
pub mod request;
pub mod request_index;
pub mod source;

pub use batch::{Batch, BatchGroup, BatchLimits, PendingKernel, partition};
pub use builder::{BatchBuilder, BuildReport};
pub use cache_config::KernelsCacheConfig;
pub use compiler::{CompileError, CompiledProgram, DeviceCompiler};
pub use dedup::DedupCache;
pub use error::{CompileFailure, KernelsCacheError};
pub use executor::{InlineExecutor, Task, TaskExecutor, ThreadPoolExecutor};
pub use instrument::{CacheStats, CacheStatsSnapshot, init_tracing};
pub use kernel::{CompiledKernel, KernelHandle};
pub use kernels_cache::KernelsCache;
pub use key::KernelKey;
pub use registry::{AddSummary, SourceRegistry};
pub use request::RequestId;
pub use request_index::RequestIndex;
pub use source::KernelSource;
