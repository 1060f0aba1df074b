//! Cache management types

use std::num::NonZeroUsize;

/// Cache strategy for the element cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheStrategy {
    /// Keep every resolved element until it is invalidated (default)
    #[default]
    Full,
    /// LRU cache with maximum entries
    Lru(usize),
    /// No caching - every resolution goes to the element store
    None,
}

impl CacheStrategy {
    /// Validate cache strategy configuration
    ///
    /// # Errors
    ///
    /// Returns error if LRU size is 0
    pub fn validate(&self) -> crate::Result<()> {
        match self {
            CacheStrategy::Lru(size) if *size == 0 => Err(crate::Error::InvalidCacheStrategy(
                "LRU cache size must be greater than 0".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Capacity of the LRU variant, `None` for every other strategy.
    pub(crate) fn lru_capacity(&self) -> Option<NonZeroUsize> {
        match self {
            CacheStrategy::Lru(size) => NonZeroUsize::new(*size),
            _ => None,
        }
    }
}
