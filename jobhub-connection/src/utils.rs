use std::borrow::Cow;

use serde_json::json;

use crate::config::RedisConnectionConfig;

pub fn config_metadata(config: &RedisConnectionConfig) -> serde_json::Value {
    json!({
        "redis_url": sanitize_redis_url(&config.url).as_ref(),
        "max_connections": config.max_connections,
        "connect_timeout_secs": config.connect_timeout_secs,
        "wait_timeout_secs": config.wait_timeout_secs,
    })
}

/// Redacts the userinfo part of a Redis URL so it can be logged.
///
/// `redis://:secret@host:6379/0` becomes `redis://****@host:6379/0`. URLs without
/// credentials are returned untouched and without allocating.
pub fn sanitize_redis_url(raw: &str) -> Cow<'_, str> {
    let Some(scheme_end) = raw.find("://") else {
        return Cow::Borrowed("<redacted>");
    };
    let rest = &raw[scheme_end + 3..];

    let host_end = rest.find('/').unwrap_or(rest.len());
    let authority = &rest[..host_end];

    match authority.rfind('@') {
        Some(at_pos) => {
            let scheme = &raw[..scheme_end + 3];
            let host_and_rest = &rest[at_pos + 1..];
            let mut result = String::with_capacity(scheme.len() + 5 + host_and_rest.len());
            result.push_str(scheme);
            result.push_str("****@");
            result.push_str(host_and_rest);
            Cow::Owned(result)
        }
        None => Cow::Borrowed(raw),
    }
}
