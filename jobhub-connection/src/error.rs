use std::num::ParseIntError;

use thiserror::Error;

/// Errors that can occur while configuring or creating the Redis pool.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("environment variable {0} is missing")]
    MissingEnvVar(String),
    #[error("redis url cannot be empty")]
    EmptyRedisUrl,
    #[error("environment variable {0} contains invalid unicode")]
    InvalidUnicode(String),
    #[error("failed to parse numeric environment variable {var}: {source}")]
    InvalidNumber {
        var: String,
        #[source]
        source: ParseIntError,
    },
    #[error("invalid connection configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to create redis pool: {0}")]
    CreatePool(#[from] deadpool_redis::CreatePoolError),
    #[error("failed to get a pooled redis connection: {0}")]
    Pool(#[from] deadpool_redis::PoolError),
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}
