//! Binder configuration.

use dynbind_core::ConfigError;

/// Tunables for a [`Binder`](crate::Binder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinderConfig {
    /// Maximum number of rules cached per call site.
    pub cache_capacity: usize,
    /// Move a hit rule to the front of its site when the site is not being written.
    pub promote_on_hit: bool,
    /// Treat COM interop objects as adaptable to any interface and to `IEnumerator`.
    ///
    /// Hosts without COM interop disable this; the COM stages then never match.
    pub com_interop: bool,
}

impl BinderConfig {
    /// Default per-site cache capacity.
    pub const DEFAULT_CACHE_CAPACITY: usize = 10;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_promote_on_hit(mut self, promote: bool) -> Self {
        self.promote_on_hit = promote;
        self
    }

    pub fn with_com_interop(mut self, enabled: bool) -> Self {
        self.com_interop = enabled;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::ZeroCacheCapacity);
        }
        Ok(())
    }
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
            promote_on_hit: true,
            com_interop: true,
        }
    }
}
