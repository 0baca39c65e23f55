//! Core types for the enqueue engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{JobRecord, RecordError};
use crate::time;

/// Well-known record keys.
pub mod keys {
    pub const QUEUE: &str = "queue";
    pub const CLASS: &str = "class";
    pub const ARGS: &str = "args";
    pub const JID: &str = "jid";
    pub const ENQUEUED_AT: &str = "enqueued_at";
    pub const AT: &str = "at";
    pub const RETRY: &str = "retry";
    pub const RETRY_COUNT: &str = "retry_count";
    pub const MAX_ATTEMPTS: &str = "max_attempts";
}

#[inline]
fn is_zero(n: &u32) -> bool {
    *n == 0
}

#[inline]
fn is_false(b: &bool) -> bool {
    !*b
}

#[inline]
fn is_unset_timestamp(at: &f64) -> bool {
    *at <= 0.0
}

/// Retry and scheduling knobs for the typed enqueue path.
///
/// Zero / `false` values mean "not set" and are left out of the stored record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnqueueOptions {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub max_attempts: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "is_false")]
    pub retry: bool,
    /// Dispatch-eligibility time in fractional epoch seconds. `<= 0` means now.
    #[serde(default, skip_serializing_if = "is_unset_timestamp")]
    pub at: f64,
}

impl EnqueueOptions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    #[inline]
    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    #[inline]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Dispatch no earlier than `at` epoch seconds.
    #[inline]
    pub fn at(mut self, at: f64) -> Self {
        self.at = at;
        self
    }

    pub fn at_time(self, at: DateTime<Utc>) -> Self {
        self.at(time::to_seconds(at))
    }

    /// Dispatch `delay` from now. The clock is read here, not at dispatch.
    pub fn delay(self, delay: std::time::Duration) -> Self {
        self.at(time::now_seconds() + time::duration_to_seconds(delay))
    }

    /// Whether an explicit dispatch time was given.
    #[inline]
    pub fn has_at(&self) -> bool {
        !is_unset_timestamp(&self.at)
    }
}

/// Canonical typed view of a job.
///
/// Field order here is the key order of records built on the typed path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub queue: String,
    pub class: String,
    #[serde(default)]
    pub args: Value,
    pub jid: String,
    pub enqueued_at: f64,
    #[serde(flatten)]
    pub options: EnqueueOptions,
}

impl JobDescriptor {
    /// Dispatch-eligibility time; `enqueued_at` when none was set.
    #[inline]
    pub fn at(&self) -> f64 {
        if self.options.has_at() {
            self.options.at
        } else {
            self.enqueued_at
        }
    }

    /// Serialize into a mutable [`JobRecord`].
    pub fn into_record(self) -> Result<JobRecord, RecordError> {
        let value = serde_json::to_value(self).map_err(RecordError::Encode)?;
        JobRecord::try_from(value)
    }
}

impl TryFrom<&JobRecord> for JobDescriptor {
    type Error = RecordError;

    fn try_from(record: &JobRecord) -> Result<Self, Self::Error> {
        record.to_descriptor()
    }
}
