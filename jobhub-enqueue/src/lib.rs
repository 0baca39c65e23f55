//! Job enqueueing engine.
//!
//! Jobs are JSON records carrying a queue name, a handler class, arguments, a
//! 24-character hex `jid`, and fractional-second `enqueued_at` / `at` timestamps.
//! A record that is already due is appended to `<ns>queue:<name>` (and the queue
//! name added to `<ns>queues`); one whose `at` lies in the future goes into the
//! `<ns>schedule` sorted set, scored by `at`. Executing jobs and promoting
//! scheduled ones are left to separate workers.
//!
//! # Architecture
//!
//! - [`Enqueuer`] - Typed and raw-record entry points over one dispatch routine
//! - [`JobRecord`] - Ordered, mutable JSON document that keeps unknown fields
//! - [`JobDescriptor`] / [`EnqueueOptions`] - Canonical typed view of a job
//! - [`JobStore`] - Store seam; [`MemoryStore`] in process, `RedisStore` over a pool
//!
//! # Example
//!
//! ```rust,no_run
//! use jobhub_enqueue::{EnqueueConfig, EnqueueOptions, Enqueuer, MemoryStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), jobhub_enqueue::EnqueueError> {
//!     let enqueuer = Enqueuer::new(MemoryStore::new(), EnqueueConfig::new("prod:"));
//!
//!     // Due now: lands in `prod:queue:emails`.
//!     let jid = enqueuer.enqueue("emails", "Send", &json!({"to": "a@b.com"})).await?;
//!     println!("enqueued {jid}");
//!
//!     // Due in 30 seconds: lands in `prod:schedule`.
//!     enqueuer.enqueue_in("emails", "Send", 30.0, &json!({"to": "a@b.com"})).await?;
//!
//!     let options = EnqueueOptions::new().retry(true).max_attempts(5);
//!     enqueuer.enqueue_with_options("emails", "Send", &[1, 2], options).await?;
//!
//!     // Forwarded from elsewhere; unknown fields are kept.
//!     let mut record = r#"{"queue": "emails", "class": "Send", "trace": "abc"}"#.parse()?;
//!     enqueuer.enqueue_record(&mut record).await?;
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
pub mod jid;
mod record;
#[cfg(feature = "redis")]
mod redis_store;
mod store;
pub mod time;
mod types;

pub use client::{complete_record, prepare_record, Enqueuer};
pub use config::{EnqueueConfig, QUEUES_KEY, SCHEDULED_JOBS_KEY};
pub use error::EnqueueError;
pub use jid::{generate_jid, JidError};
pub use record::{Field, FieldError, JobRecord, RecordError};
#[cfg(feature = "redis")]
pub use redis_store::{RedisSession, RedisStore};
pub use store::{
    JobStore, MemorySession, MemoryStore, ScoredMember, StoreError, StoreSession,
};
pub use types::{keys, EnqueueOptions, JobDescriptor};

// Re-exported so downstream stores can implement the async traits.
pub use async_trait::async_trait;
#[cfg(feature = "redis")]
pub use jobhub_connection::{ConnectionError, RedisConnectionConfig};
