//! Typed environment variable descriptors.
//!
//! [`TypedEnvVar`] pairs an [`EnvVar`] with parse and format callbacks so call
//! sites read `Option<T>` instead of raw strings.
//!
//! # Examples
//!
//! ```
//! use kernels_cache_env::MAX_KERNELS_PER_BATCH;
//!
//! let guard = MAX_KERNELS_PER_BATCH.set_guard(4).expect("set batch size");
//! assert_eq!(*guard, 4);
//! assert_eq!(MAX_KERNELS_PER_BATCH.get().expect("parse"), Some(4));
//! ```

use std::{marker::PhantomData, ops::Deref};

use super::{EnvVar, Environment};

/// Errors emitted when reading or writing a typed variable.
#[derive(Debug, thiserror::Error)]
pub enum EnvVarError {
    #[error("failed to parse environment variable {name} from '{value}': {source}")]
    Parse {
        name: &'static str,
        value: String,
        source: EnvVarParseError,
    },
    #[error("failed to format environment variable {name}: {source}")]
    Format { name: &'static str, source: EnvVarFormatError },
}

/// Error produced by a parse callback.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct EnvVarParseError {
    message: String,
}

impl EnvVarParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Error produced by a format callback.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct EnvVarFormatError {
    message: String,
}

impl EnvVarFormatError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

pub type ParseFn<T> = fn(&str) -> Result<T, EnvVarParseError>;
pub type FormatFn<T> = fn(&T) -> Result<String, EnvVarFormatError>;

/// Descriptor for a strongly-typed environment variable.
#[derive(Clone, Copy)]
pub struct TypedEnvVar<T> {
    var: EnvVar,
    parse: ParseFn<T>,
    format: FormatFn<T>,
    _marker: PhantomData<T>,
}

impl<T> TypedEnvVar<T> {
    pub const fn new(var: EnvVar, parse: ParseFn<T>, format: FormatFn<T>) -> Self {
        Self {
            var,
            parse,
            format,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.var.key()
    }

    /// Read and parse the variable. `Ok(None)` when it is not set.
    pub fn get(&self) -> Result<Option<T>, EnvVarError> {
        let Some(raw) = Environment::get(self.var) else {
            return Ok(None);
        };
        (self.parse)(&raw).map(Some).map_err(|source| EnvVarError::Parse {
            name: self.key(),
            value: raw,
            source,
        })
    }

    /// Set the variable for the lifetime of the returned guard.
    pub fn set_guard(&self, value: T) -> Result<TypedEnvVarGuard<'_, T>, EnvVarError> {
        let formatted = self.format_value(&value)?;
        let previous = Environment::get(self.var);
        Environment::set(self.var, &formatted);
        Ok(TypedEnvVarGuard {
            descriptor: self,
            previous,
            value,
        })
    }

    fn format_value(&self, value: &T) -> Result<String, EnvVarError> {
        (self.format)(value).map_err(|source| EnvVarError::Format { name: self.key(), source })
    }
}

/// Restores the previous state of a typed variable on drop.
pub struct TypedEnvVarGuard<'a, T> {
    descriptor: &'a TypedEnvVar<T>,
    previous: Option<String>,
    value: T,
}

impl<T> Deref for TypedEnvVarGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T> Drop for TypedEnvVarGuard<'_, T> {
    fn drop(&mut self) {
        match &self.previous {
            Some(previous) => Environment::set(self.descriptor.var, previous),
            None => Environment::remove(self.descriptor.var),
        }
    }
}
