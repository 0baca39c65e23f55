use std::env::{self, VarError};
use std::num::ParseIntError;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConnectionError;

pub const DEFAULT_MAX_CONNECTIONS: usize = 16;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 10;

/// Settings for the pooled Redis connection shared by every enqueue call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RedisConnectionConfig {
    pub url: String,
    pub max_connections: usize,
    pub connect_timeout_secs: u64,
    pub wait_timeout_secs: Option<u64>,
}

impl Default for RedisConnectionConfig {
    #[inline]
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            wait_timeout_secs: Some(DEFAULT_WAIT_TIMEOUT_SECS),
        }
    }
}

impl RedisConnectionConfig {
    /// Creates a new configuration with the provided URL and default pool limits.
    #[inline]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from environment variables using the supplied prefix.
    ///
    /// Expected variables:
    /// - `{PREFIX}_REDIS_URL` (required)
    /// - `{PREFIX}_REDIS_MAX_CONNECTIONS` (optional)
    /// - `{PREFIX}_REDIS_CONNECT_TIMEOUT_SECS` (optional)
    /// - `{PREFIX}_REDIS_WAIT_TIMEOUT_SECS` (optional, `0` disables the wait limit)
    pub fn from_env(prefix: &str) -> Result<Self, ConnectionError> {
        let url_var = format!("{prefix}_REDIS_URL");
        let url = match env::var(&url_var) {
            Ok(url) => url,
            Err(VarError::NotPresent) => return Err(ConnectionError::MissingEnvVar(url_var)),
            Err(VarError::NotUnicode(_)) => return Err(ConnectionError::InvalidUnicode(url_var)),
        };

        let mut config = Self::new(url.trim());

        if let Some(max) = maybe_parse_env::<usize>(prefix, "REDIS_MAX_CONNECTIONS")? {
            config.max_connections = max;
        }
        if let Some(secs) = maybe_parse_env::<u64>(prefix, "REDIS_CONNECT_TIMEOUT_SECS")? {
            config.connect_timeout_secs = secs;
        }
        if let Some(secs) = maybe_parse_env::<u64>(prefix, "REDIS_WAIT_TIMEOUT_SECS")? {
            config.wait_timeout_secs = (secs > 0).then_some(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the pool builder relies on.
    pub fn validate(&self) -> Result<(), ConnectionError> {
        if self.url.trim().is_empty() {
            return Err(ConnectionError::EmptyRedisUrl);
        }
        if self.max_connections == 0 {
            return Err(ConnectionError::InvalidConfig(
                "max_connections must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    #[inline]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[inline]
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_secs.map(Duration::from_secs)
    }
}

fn maybe_parse_env<T>(prefix: &str, suffix: &str) -> Result<Option<T>, ConnectionError>
where
    T: FromStr<Err = ParseIntError>,
{
    let var_name = format!("{prefix}_{suffix}");
    match env::var(&var_name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                trimmed
                    .parse()
                    .map(Some)
                    .map_err(|source| ConnectionError::InvalidNumber {
                        var: var_name,
                        source,
                    })
            }
        }
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(ConnectionError::InvalidUnicode(var_name)),
    }
}
