//! Cache configuration.
//!
//! Controls how long entries live via the `[cache]` table of `albumsync.toml`.

use std::num::NonZeroUsize;

// Default ceiling when `lru` eviction is selected without `max_entries`.
const DEFAULT_LRU_MAX_ENTRIES: usize = 64;

/// How entries leave the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Entries live until the session is cleared.
    #[default]
    Session,
    /// Keep at most `max_entries`; the least recently read entry that has no
    /// subscriber and no fetch in flight is evicted first.
    Lru { max_entries: NonZeroUsize },
}

impl EvictionPolicy {
    pub fn lru(max_entries: usize) -> Self {
        Self::Lru {
            max_entries: NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN),
        }
    }

    /// Returns the entry ceiling, if any.
    pub fn max_entries(&self) -> Option<NonZeroUsize> {
        match self {
            Self::Session => None,
            Self::Lru { max_entries } => Some(*max_entries),
        }
    }
}

/// Cache store configuration.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    pub eviction: EvictionPolicy,
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        let eviction = match settings.eviction {
            crate::config::EvictionMode::Session => EvictionPolicy::Session,
            crate::config::EvictionMode::Lru => EvictionPolicy::Lru {
                max_entries: settings.max_entries.unwrap_or(
                    NonZeroUsize::new(DEFAULT_LRU_MAX_ENTRIES).unwrap_or(NonZeroUsize::MIN),
                ),
            },
        };
        Self { eviction }
    }
}
