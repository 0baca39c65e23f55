//! Redis-backed [`JobStore`].

use async_trait::async_trait;
use jobhub_connection::{
    create_pool, ConnectionError, PooledConnection, RedisConnectionConfig, RedisPool,
};

use crate::client::Enqueuer;
use crate::config::EnqueueConfig;
use crate::store::{JobStore, StoreError, StoreSession};

impl From<deadpool_redis::PoolError> for StoreError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::Connection(err.to_string())
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
            Self::Connection(err.to_string())
        } else {
            Self::Command(err.to_string())
        }
    }
}

/// Store that checks one connection out of a shared pool per session.
#[derive(Clone)]
pub struct RedisStore {
    pool: RedisPool,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("pool", &self.pool.status())
            .finish()
    }
}

impl RedisStore {
    /// Wrap an existing pool. The pool's configuration is never changed.
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Build a pool from `config` and wrap it.
    pub fn connect(config: &RedisConnectionConfig) -> Result<Self, ConnectionError> {
        Ok(Self::new(create_pool(config)?))
    }

    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }
}

impl Enqueuer<RedisStore> {
    /// Wire an engine from `{PREFIX}_REDIS_*` and `{PREFIX}_NAMESPACE`.
    pub fn from_env(prefix: &str) -> Result<Self, ConnectionError> {
        let connection = RedisConnectionConfig::from_env(prefix)?;
        let store = RedisStore::connect(&connection)?;
        Ok(Self::new(store, EnqueueConfig::from_env(prefix)))
    }
}

#[async_trait]
impl JobStore for RedisStore {
    type Session = RedisSession;

    async fn acquire(&self) -> Result<Self::Session, StoreError> {
        let conn = self.pool.get().await?;
        Ok(RedisSession { conn })
    }
}

/// A pooled Redis connection; returned to the pool on drop.
pub struct RedisSession {
    conn: PooledConnection,
}

#[async_trait]
impl StoreSession for RedisSession {
    async fn add_to_set(&mut self, key: &str, member: &str) -> Result<(), StoreError> {
        redis::cmd("SADD")
            .arg(key)
            .arg(member)
            .query_async::<()>(&mut self.conn)
            .await?;
        Ok(())
    }

    async fn push_to_list(&mut self, key: &str, payload: &[u8]) -> Result<(), StoreError> {
        redis::cmd("RPUSH")
            .arg(key)
            .arg(payload)
            .query_async::<()>(&mut self.conn)
            .await?;
        Ok(())
    }

    async fn add_to_sorted_set(
        &mut self,
        key: &str,
        score: f64,
        payload: &[u8],
    ) -> Result<(), StoreError> {
        redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(payload)
            .query_async::<()>(&mut self.conn)
            .await?;
        Ok(())
    }
}
