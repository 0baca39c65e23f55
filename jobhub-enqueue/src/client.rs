//! Enqueue engine.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::EnqueueConfig;
use crate::error::EnqueueError;
use crate::jid::generate_jid;
use crate::record::JobRecord;
use crate::store::{JobStore, StoreSession};
use crate::time;
use crate::types::{keys, EnqueueOptions, JobDescriptor};

/// Places jobs into the immediate queues or the scheduled set of a [`JobStore`].
///
/// Cloning is cheap when the store is (pool handles, [`MemoryStore`](crate::MemoryStore)).
#[derive(Clone)]
pub struct Enqueuer<S> {
    store: S,
    config: Arc<EnqueueConfig>,
}

impl<S> fmt::Debug for Enqueuer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enqueuer")
            .field("store", &"<JobStore>")
            .field("config", &self.config)
            .finish()
    }
}

impl<S: JobStore> Enqueuer<S> {
    pub fn new(store: S, config: EnqueueConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    #[inline]
    pub fn config(&self) -> &EnqueueConfig {
        &self.config
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Enqueue a job for immediate dispatch. Returns its jid.
    pub async fn enqueue<A>(&self, queue: &str, class: &str, args: &A) -> Result<String, EnqueueError>
    where
        A: Serialize + ?Sized,
    {
        self.enqueue_with_options(queue, class, args, EnqueueOptions::new())
            .await
    }

    /// Enqueue a job that becomes due `delay_secs` seconds from now.
    pub async fn enqueue_in<A>(
        &self,
        queue: &str,
        class: &str,
        delay_secs: f64,
        args: &A,
    ) -> Result<String, EnqueueError>
    where
        A: Serialize + ?Sized,
    {
        let options = EnqueueOptions::new().at(time::now_seconds() + delay_secs);
        self.enqueue_with_options(queue, class, args, options).await
    }

    /// Enqueue a job that becomes due at `at`.
    pub async fn enqueue_at<A>(
        &self,
        queue: &str,
        class: &str,
        at: DateTime<Utc>,
        args: &A,
    ) -> Result<String, EnqueueError>
    where
        A: Serialize + ?Sized,
    {
        let options = EnqueueOptions::new().at_time(at);
        self.enqueue_with_options(queue, class, args, options).await
    }

    /// Enqueue with full control over retry fields and dispatch time.
    #[instrument(skip_all, err, fields(queue = %queue, class = %class, jid))]
    pub async fn enqueue_with_options<A>(
        &self,
        queue: &str,
        class: &str,
        args: &A,
        options: EnqueueOptions,
    ) -> Result<String, EnqueueError>
    where
        A: Serialize + ?Sized,
    {
        let record = self.prepare_record(queue, class, args, options)?;
        self.dispatch(&record).await
    }

    /// Build the record [`enqueue_with_options`](Self::enqueue_with_options) would
    /// store, without touching the store.
    pub fn prepare_record<A>(
        &self,
        queue: &str,
        class: &str,
        args: &A,
        options: EnqueueOptions,
    ) -> Result<JobRecord, EnqueueError>
    where
        A: Serialize + ?Sized,
    {
        prepare_record(queue, class, args, options)
    }

    /// Validate, complete and dispatch a record built elsewhere.
    ///
    /// `queue` must be a string. A missing `jid` or `at` is filled in; a present
    /// but malformed one is rejected. `enqueued_at` is always overwritten. The
    /// completed fields are written back into `record`. Every other field is
    /// stored untouched.
    #[instrument(skip_all, err, fields(queue, jid))]
    pub async fn enqueue_record(&self, record: &mut JobRecord) -> Result<String, EnqueueError> {
        complete_record(record, time::now_seconds())?;
        self.dispatch(record).await
    }

    /// Shared by both entry points: route a dispatch-ready record.
    async fn dispatch(&self, record: &JobRecord) -> Result<String, EnqueueError> {
        let queue = record.get(keys::QUEUE).as_str().map_err(EnqueueError::BadQueue)?;
        let jid = record.get(keys::JID).as_str().map_err(EnqueueError::BadJid)?;
        if jid.is_empty() {
            return Err(EnqueueError::EmptyJid);
        }
        let at = record.get(keys::AT).as_f64().map_err(EnqueueError::BadAt)?;

        let span = tracing::Span::current();
        span.record("queue", queue);
        span.record("jid", jid);

        let payload = record.encode()?;
        let mut session = self.store.acquire().await?;

        let now = time::now_seconds();
        if now < at {
            debug!(at, now, "scheduling job");
            session
                .add_to_sorted_set(&self.config.schedule_key(), at, &payload)
                .await?;
            return Ok(jid.to_owned());
        }

        debug!(at, now, "pushing job to queue");
        session.add_to_set(&self.config.queues_key(), queue).await?;
        if let Err(err) = session
            .push_to_list(&self.config.queue_key(queue), &payload)
            .await
        {
            warn!(error = %err, "queue registered but job was not appended");
            return Err(err.into());
        }

        Ok(jid.to_owned())
    }
}

/// Typed front end: a fresh record with a new jid and `enqueued_at` set to now.
/// An unset `at` defaults to the same instant.
pub fn prepare_record<A>(
    queue: &str,
    class: &str,
    args: &A,
    mut options: EnqueueOptions,
) -> Result<JobRecord, EnqueueError>
where
    A: Serialize + ?Sized,
{
    let now = time::now_seconds();
    if !options.has_at() {
        options.at = now;
    }

    let descriptor = JobDescriptor {
        queue: queue.to_owned(),
        class: class.to_owned(),
        args: serde_json::to_value(args)?,
        jid: generate_jid()?,
        enqueued_at: now,
        options,
    };
    Ok(descriptor.into_record()?)
}

/// Raw front end: check and fill the fields dispatch relies on.
///
/// All checks run before the first write, so a rejected record is left as it was.
pub fn complete_record(record: &mut JobRecord, now: f64) -> Result<(), EnqueueError> {
    record
        .get(keys::QUEUE)
        .as_str()
        .map_err(EnqueueError::BadQueue)?;

    let jid = record.get(keys::JID);
    let needs_jid = match jid.as_str() {
        Ok("") => return Err(EnqueueError::EmptyJid),
        Ok(_) => false,
        Err(err) if err.is_missing() => true,
        Err(err) => return Err(EnqueueError::BadJid(err)),
    };

    let at = record.get(keys::AT);
    let needs_at = match at.as_f64() {
        Ok(_) => false,
        Err(err) if err.is_missing() => true,
        Err(err) => return Err(EnqueueError::BadAt(err)),
    };

    if needs_jid {
        record.set(keys::JID, generate_jid()?);
    }
    if needs_at {
        record.set(keys::AT, now);
    }
    record.set(keys::ENQUEUED_AT, now);
    Ok(())
}
