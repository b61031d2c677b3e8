//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::middleware::rate_limit::{LimitClass, RateLimiter, RedisRestLimiter};
use crate::middleware::ClassLimiter;

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid Redis REST URL: {0}")]
    RedisUrl(#[from] url::ParseError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Uses the Redis REST limiter when configured, the in-process one otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis REST configuration is unusable.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let rate_limiter = match &config.redis {
            Some(redis) => RateLimiter::redis(RedisRestLimiter::new(reqwest::Client::new(), redis)?),
            None => RateLimiter::in_memory(),
        };

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                rate_limiter: Arc::new(rate_limiter),
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the rate limiter.
    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.rate_limiter
    }

    /// Middleware state limiting a route group to `class`.
    #[must_use]
    pub fn limiter_for(&self, class: LimitClass) -> ClassLimiter {
        ClassLimiter::new(Arc::clone(&self.inner.rate_limiter), class)
    }
}
