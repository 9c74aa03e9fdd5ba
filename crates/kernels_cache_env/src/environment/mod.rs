//! Process environment abstractions shared by the kernels cache crates.

pub mod cache;
pub mod guard;
pub mod value;

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use cache::CacheEnvVar;

/// Namespaced environment variable identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnvVar {
    /// Variables that tune the kernels cache itself.
    Cache(CacheEnvVar),
}

impl From<CacheEnvVar> for EnvVar {
    fn from(value: CacheEnvVar) -> Self {
        Self::Cache(value)
    }
}

impl EnvVar {
    /// Canonical environment variable key for the identifier.
    pub const fn key(self) -> &'static str {
        match self {
            EnvVar::Cache(inner) => inner.key(),
        }
    }
}

/// Process environment facade that centralises access and synchronisation.
pub struct Environment;

impl Environment {
    /// Acquire the global environment mutex.
    ///
    /// A poisoned lock is recovered: the guarded value is `()`, so there is no
    /// state a panicking holder could have left half-written.
    pub fn lock() -> MutexGuard<'static, ()> {
        static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_MUTEX.get_or_init(|| Mutex::new(())).lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the variable as a UTF-8 string if present.
    pub fn get(var: impl Into<EnvVar>) -> Option<String> {
        std::env::var(var.into().key()).ok()
    }

    /// Set the variable, taking the global lock for the duration of the write.
    pub fn set(var: impl Into<EnvVar>, value: &str) {
        let mut guard = Self::lock();
        Self::set_locked(var.into(), value, &mut guard);
    }

    /// Remove the variable, taking the global lock for the duration of the write.
    pub fn remove(var: impl Into<EnvVar>) {
        let mut guard = Self::lock();
        Self::remove_locked(var.into(), &mut guard);
    }

    pub(crate) fn set_locked(var: EnvVar, value: &str, _guard: &mut MutexGuard<'static, ()>) {
        // SAFETY: the guard proves the caller holds the global environment
        // mutex, so no other writer in this process runs concurrently.
        unsafe { std::env::set_var(var.key(), value) };
    }

    pub(crate) fn remove_locked(var: EnvVar, _guard: &mut MutexGuard<'static, ()>) {
        // SAFETY: same contract as `set_locked`.
        unsafe { std::env::remove_var(var.key()) };
    }
}
