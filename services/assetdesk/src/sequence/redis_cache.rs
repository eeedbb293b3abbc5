//! Redis cache backend.
//!
//! Counters, the username presence bitmap and login attempt counters live in one Redis database
//! shared by every instance. Each call clones the `ConnectionManager`, which multiplexes over a
//! single connection and reconnects on failure.
use super::{CacheError, CacheResult, SequenceCache};
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client, ErrorKind, RedisError};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> CacheResult<Self> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(CONNECT_TIMEOUT);
        let client = Client::open(redis_url).map_err(unavailable)?;
        let conn = client
            .get_connection_manager_with_config(config)
            .await
            .map_err(unavailable)?;
        Ok(Self { conn })
    }
}

fn unavailable(err: RedisError) -> CacheError {
    CacheError::Unavailable(err.to_string())
}

fn command_error(key: &str) -> impl FnOnce(RedisError) -> CacheError + '_ {
    move |err| match err.kind() {
        ErrorKind::TypeError | ErrorKind::ResponseError => CacheError::NotAnInteger(key.to_string()),
        _ => unavailable(err),
    }
}

#[async_trait]
impl SequenceCache for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(unavailable)
    }

    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await.map_err(unavailable)?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        conn.set_nx(key, value).await.map_err(unavailable)
    }

    async fn incr(&self, key: &str, delta: i64) -> CacheResult<i64> {
        let mut conn = self.conn.clone();
        conn.incr(key, delta).await.map_err(command_error(key))
    }

    async fn get_bit(&self, key: &str, offset: u32) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        conn.getbit(key, offset as usize).await.map_err(unavailable)
    }

    async fn set_bit(&self, key: &str, offset: u32, value: bool) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        conn.setbit(key, offset as usize, value)
            .await
            .map_err(unavailable)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.map_err(unavailable)?;
        Ok(())
    }

    async fn expire(&self, key: &str, seconds: u64) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .expire(key, seconds as i64)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
