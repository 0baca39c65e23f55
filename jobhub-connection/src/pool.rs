use deadpool_redis::{Config, PoolConfig, Runtime};
use tracing::{debug, info};

use crate::config::RedisConnectionConfig;
use crate::error::ConnectionError;
use crate::utils::sanitize_redis_url;

/// Shared handle to the Redis connection pool. Cloning is cheap.
pub type RedisPool = deadpool_redis::Pool;

/// A connection checked out of [`RedisPool`]; it goes back to the pool on drop.
pub type PooledConnection = deadpool_redis::Connection;

/// Builds a connection pool from the provided configuration.
///
/// Connections are opened lazily, so this does not touch the network. Use [`ping`]
/// to verify the server is reachable.
pub fn create_pool(config: &RedisConnectionConfig) -> Result<RedisPool, ConnectionError> {
    config.validate()?;

    let mut pool_config = PoolConfig::new(config.max_connections);
    pool_config.timeouts.create = Some(config.connect_timeout());
    pool_config.timeouts.wait = config.wait_timeout();

    let mut redis_config = Config::from_url(config.url.trim());
    redis_config.pool = Some(pool_config);

    let pool = redis_config.create_pool(Some(Runtime::Tokio1))?;

    info!(
        redis_url = %sanitize_redis_url(&config.url),
        max_connections = config.max_connections,
        "redis pool created"
    );

    Ok(pool)
}

/// Checks out one connection and issues `PING`.
pub async fn ping(pool: &RedisPool) -> Result<(), ConnectionError> {
    let mut conn = pool.get().await?;
    let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
    debug!(%reply, "redis ping");
    Ok(())
}
