//! Redis Key-Value Adapter
//!
//! Implements the `KeyValueBackend` port on a Redis connection manager. The
//! manager is created once at startup, reconnects on its own, and is cloned
//! per command so all resolutions share one multiplexed connection.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

use crate::domain::{KeyValueBackend, StoreTier};
use crate::error::{Error, Result};

/// Redis-backed key-value adapter
#[derive(Clone)]
pub struct RedisKeyValueBackend {
    conn: ConnectionManager,
}

impl RedisKeyValueBackend {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379`)
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        info!("Connected to Redis at {}", url);
        Ok(Self { conn })
    }
}

impl std::fmt::Debug for RedisKeyValueBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisKeyValueBackend").finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyValueBackend for RedisKeyValueBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        if value.is_none() {
            debug!(key = %key, "Could not find key in Redis");
        }
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        // SETEX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(Error::TierUnavailable {
                tier: StoreTier::Fast,
                reason: format!("unexpected PING reply: {}", pong),
            })
        }
    }
}
