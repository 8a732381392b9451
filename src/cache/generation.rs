//! Fetch generations.
//!
//! Every fetch the store starts is stamped with a store-wide, monotonically
//! increasing generation. A completion is applied only if its generation is
//! still the one the entry is waiting for.

use std::sync::atomic::{AtomicU64, Ordering};

/// Sequence number of one fetch.
pub type Generation = u64;

/// Hands out generations in issue order.
#[derive(Debug, Default)]
pub struct GenerationCounter {
    next: AtomicU64,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the next generation.
    pub fn next(&self) -> Generation {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}
