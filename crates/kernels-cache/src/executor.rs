//! Bounded-parallelism execution of batch compile tasks.

use crate::error::KernelsCacheError;

/// A unit of work handed to a [`TaskExecutor`]. May borrow from the caller.
pub type Task<'a> = Box<dyn FnOnce() + Send + 'a>;

/// Runs tasks with bounded parallelism.
///
/// `run_all` is the barrier `build_all` relies on: it must not return before
/// every task it was given has finished.
pub trait TaskExecutor: Send + Sync {
    fn parallelism(&self) -> usize;

    fn run_all<'a>(&self, tasks: Vec<Task<'a>>);
}

/// Dedicated `rayon` pool with one thread per compile stream.
pub struct ThreadPoolExecutor {
    pool: rayon::ThreadPool,
    streams: usize,
}

impl ThreadPoolExecutor {
    pub fn new(streams: usize) -> Result<Self, KernelsCacheError> {
        if streams == 0 {
            return Err(KernelsCacheError::Config("stream count must be at least 1".to_string()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(streams)
            .thread_name(|i| format!("kernels-cache-{i}"))
            .build()
            .map_err(|e| KernelsCacheError::Executor(e.to_string()))?;
        Ok(Self { pool, streams })
    }
}

impl TaskExecutor for ThreadPoolExecutor {
    fn parallelism(&self) -> usize {
        self.streams
    }

    fn run_all<'a>(&self, tasks: Vec<Task<'a>>) {
        if tasks.is_empty() {
            return;
        }
        self.pool.scope(|scope| {
            for task in tasks {
                scope.spawn(move |_| task());
            }
        });
    }
}

/// Runs every task on the calling thread, in submission order.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineExecutor;

impl TaskExecutor for InlineExecutor {
    fn parallelism(&self) -> usize {
        1
    }

    fn run_all<'a>(&self, tasks: Vec<Task<'a>>) {
        for task in tasks {
            task();
        }
    }
}

#[path = "executor.test.rs"]
mod tests;
