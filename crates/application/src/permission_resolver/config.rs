use std::time::Duration;

use chartfold_core::{AppError, AppResult};

/// Longest TTL the resolver accepts for cached permission sets.
///
/// Invalidation keeps cached sets fresh on every managed write path; the
/// TTL only bounds staleness after writes the coordinator never saw, so it
/// stays in minutes.
const MAX_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Default TTL for cached permission sets.
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Configuration for the permission resolver.
#[derive(Debug, Clone, Copy)]
pub struct ResolverConfig {
    /// TTL applied to every cached permission set, empty sets included.
    pub cache_ttl: Duration,
}

impl ResolverConfig {
    /// Creates a validated resolver configuration.
    pub fn new(cache_ttl: Duration) -> AppResult<Self> {
        if cache_ttl.is_zero() {
            return Err(AppError::Validation(
                "cache_ttl must be greater than zero".to_owned(),
            ));
        }

        if cache_ttl > MAX_CACHE_TTL {
            return Err(AppError::Validation(format!(
                "cache_ttl must not exceed {} seconds",
                MAX_CACHE_TTL.as_secs()
            )));
        }

        Ok(Self { cache_ttl })
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}
