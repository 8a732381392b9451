//! Cache key definitions.
//!
//! A `CacheKey` is derived from a request descriptor: a namespace naming the
//! remote resource plus the ordered parameters that select it. Keys compare
//! and hash by value, so two equal descriptors always address the same entry.

use std::fmt;

/// Namespace of the per-user album list.
pub const ALBUMS_NAMESPACE: &str = "albums";

/// Identifies one cached resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    namespace: String,
    params: Vec<String>,
}

impl CacheKey {
    pub fn new<I, S>(namespace: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespace: namespace.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Key of the album list owned by `user_id` (`albums:{user_id}`).
    pub fn albums(user_id: &str) -> Self {
        Self::new(ALBUMS_NAMESPACE, [user_id])
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.namespace)?;
        for param in &self.params {
            write!(f, ":{param}")?;
        }
        Ok(())
    }
}
