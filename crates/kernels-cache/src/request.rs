use std::{borrow::Cow, fmt};

/// Caller-defined name of a group of kernels whose order must be preserved.
///
/// Typically one graph node. Adding to an existing id appends.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(Cow<'static, str>);

impl RequestId {
    #[inline]
    pub const fn static_name(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    #[inline]
    pub fn owned_name(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for RequestId {
    fn from(value: &'static str) -> Self {
        Self::static_name(value)
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self::owned_name(value)
    }
}

impl From<&RequestId> for RequestId {
    fn from(value: &RequestId) -> Self {
        value.clone()
    }
}

impl From<u64> for RequestId {
    fn from(value: u64) -> Self {
        Self::owned_name(value.to_string())
    }
}

impl From<usize> for RequestId {
    fn from(value: usize) -> Self {
        Self::owned_name(value.to_string())
    }
}
