//! Fixed-window per-minute rate limiter for unauthenticated endpoints.
//!
//! Window keys look like `{prefix}:{key}:{unix_minute}`. Counters live in
//! process memory, or in Redis when a URL is configured so that every API
//! replica shares them.

use chrono::Utc;
use std::time::Duration;
use tlx_cache::{LocalCounter, RedisCounter};
use tlx_core::config::RateLimitSettings;
use tlx_core::{TlxError, TlxResult};
use tracing::warn;

/// Windows are kept for two minutes so a late request in the previous
/// minute never sees a recycled counter.
const WINDOW_TTL_SECS: u64 = 120;

pub enum CounterBackend {
    Memory(LocalCounter),
    Redis(RedisCounter),
}

pub struct RateLimiter {
    backend: CounterBackend,
    per_minute: u64,
    prefix: String,
}

impl RateLimiter {
    pub fn in_memory(settings: &RateLimitSettings) -> Self {
        Self::with_backend(settings, CounterBackend::Memory(LocalCounter::default()))
    }

    pub fn redis(settings: &RateLimitSettings, counter: RedisCounter) -> Self {
        Self::with_backend(settings, CounterBackend::Redis(counter))
    }

    pub fn with_backend(settings: &RateLimitSettings, backend: CounterBackend) -> Self {
        Self {
            backend,
            per_minute: settings.per_minute,
            prefix: settings.prefix.clone(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            CounterBackend::Memory(_) => "memory",
            CounterBackend::Redis(_) => "redis",
        }
    }

    /// Count one request for `key` in the current minute.
    ///
    /// Fails with `RateLimited` once the count exceeds the per-minute limit.
    /// Redis errors let the request through.
    pub async fn hit(&self, key: &str) -> TlxResult<()> {
        let minute = Utc::now().timestamp() / 60;
        let window_key = format!("{}:{}:{}", self.prefix, key, minute);

        let count = match &self.backend {
            CounterBackend::Memory(counter) => {
                counter.incr(&window_key, Duration::from_secs(WINDOW_TTL_SECS))
            }
            CounterBackend::Redis(counter) => {
                match counter.incr(&window_key, WINDOW_TTL_SECS as i64).await {
                    Ok(count) => count,
                    Err(e) => {
                        warn!(error = %e, key = %window_key, "Rate limiter backend unavailable, allowing request");
                        return Ok(());
                    }
                }
            }
        };

        if count > self.per_minute {
            metrics::counter!("ratelimit.rejected").increment(1);
            return Err(TlxError::RateLimited);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(per_minute: u64) -> RateLimitSettings {
        RateLimitSettings {
            per_minute,
            prefix: "auth".into(),
        }
    }

    #[tokio::test]
    async fn blocks_after_limit() {
        let limiter = RateLimiter::in_memory(&settings(3));
        for _ in 0..3 {
            limiter.hit("login:10.0.0.1").await.unwrap();
        }
        let err = limiter.hit("login:10.0.0.1").await.unwrap_err();
        assert_eq!(err.status_code(), 429);
        assert_eq!(err.to_string(), "Rate limit exceeded");
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = RateLimiter::in_memory(&settings(1));
        limiter.hit("register:10.0.0.1").await.unwrap();
        limiter.hit("register:10.0.0.2").await.unwrap();
        limiter.hit("invite:4:10.0.0.1").await.unwrap();
        assert!(limiter.hit("register:10.0.0.1").await.is_err());
        assert_eq!(limiter.backend_name(), "memory");
    }
}
