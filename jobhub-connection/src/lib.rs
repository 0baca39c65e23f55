pub mod config;
pub mod error;
pub mod pool;
pub mod utils;

// Re-exports for public API
pub use config::RedisConnectionConfig;
pub use error::ConnectionError;
pub use pool::{create_pool, ping, PooledConnection, RedisPool};
pub use utils::{config_metadata, sanitize_redis_url};
