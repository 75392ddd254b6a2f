//! Redis-backed fixed-window counters shared across API replicas.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tlx_core::config::RedisConfig;
use tracing::{debug, info};

/// Counter store on a single Redis node.
#[derive(Clone)]
pub struct RedisCounter {
    conn: ConnectionManager,
}

impl RedisCounter {
    /// Connect and verify with PING within `connect_timeout_ms`.
    pub async fn connect(config: &RedisConfig) -> anyhow::Result<Self> {
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "redis://localhost:6379".to_string());

        info!(url = %url, "Connecting to Redis");

        let client = redis::Client::open(url.as_str())?;
        let timeout = Duration::from_millis(config.connect_timeout_ms);
        let mut conn = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| anyhow::anyhow!("Redis connect timed out after {timeout:?}"))??;

        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!(response = %pong, "Redis connection established");

        Ok(Self { conn })
    }

    /// INCR `key`; the first hit in a window also sets EXPIRE `ttl_secs`.
    pub async fn incr(&self, key: &str, ttl_secs: i64) -> anyhow::Result<u64> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.incr(key, 1u64).await?;
        if count == 1 {
            let _: bool = conn.expire(key, ttl_secs).await?;
        }
        metrics::counter!("cache.redis.incr").increment(1);
        debug!(key = key, count = count, "Redis counter incremented");
        Ok(count)
    }
}
