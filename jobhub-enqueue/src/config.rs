//! Engine configuration and store key layout.

use std::env::{self, VarError};

use serde::Deserialize;

/// Sorted set holding jobs whose `at` is still in the future.
pub const SCHEDULED_JOBS_KEY: &str = "schedule";

/// Set of every queue name that has received a job.
pub const QUEUES_KEY: &str = "queues";

const QUEUE_KEY_PREFIX: &str = "queue:";

/// Settings shared by every enqueue call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EnqueueConfig {
    /// Prepended verbatim to every store key, e.g. `"prod:"`.
    pub namespace: String,
}

impl EnqueueConfig {
    #[inline]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Reads `{PREFIX}_NAMESPACE`; unset or non-unicode values leave the namespace empty.
    pub fn from_env(prefix: &str) -> Self {
        match env::var(format!("{prefix}_NAMESPACE")) {
            Ok(namespace) => Self::new(namespace.trim()),
            Err(VarError::NotPresent | VarError::NotUnicode(_)) => Self::default(),
        }
    }

    pub fn queues_key(&self) -> String {
        format!("{}{QUEUES_KEY}", self.namespace)
    }

    pub fn queue_key(&self, queue: &str) -> String {
        format!("{}{QUEUE_KEY_PREFIX}{queue}", self.namespace)
    }

    pub fn schedule_key(&self) -> String {
        format!("{}{SCHEDULED_JOBS_KEY}", self.namespace)
    }
}
