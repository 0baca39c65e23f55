use chrono::{Duration, Utc};
use jobhub_enqueue::time::now_seconds;
use jobhub_enqueue::{
    async_trait, keys, EnqueueConfig, EnqueueError, EnqueueOptions, Enqueuer, JobRecord, JobStore,
    MemorySession, MemoryStore, StoreError, StoreSession,
};
use serde_json::json;

const QUEUES: &str = "prod:queues";
const SCHEDULE: &str = "prod:schedule";

fn enqueuer() -> Enqueuer<MemoryStore> {
    Enqueuer::new(MemoryStore::new(), EnqueueConfig::new("prod:"))
}

async fn pop_record(store: &MemoryStore, key: &str) -> JobRecord {
    let bytes = store.pop_front(key).await.expect("queue should not be empty");
    JobRecord::from_slice(&bytes).expect("stored payload is a json object")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() < 0.1
}

// ---------------------------------------------------------------------------
// typed path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn enqueue_makes_the_queue_available() {
    let enqueuer = enqueuer();
    enqueuer.enqueue("enqueue1", "Add", &[1, 2]).await.unwrap();

    assert!(enqueuer.store().is_member(QUEUES, "enqueue1").await);
}

#[tokio::test]
async fn enqueue_adds_a_job_to_the_queue() {
    let enqueuer = enqueuer();
    let store = enqueuer.store();
    assert_eq!(store.list_len("prod:queue:enqueue2").await, 0);

    enqueuer.enqueue("enqueue2", "Add", &[1, 2]).await.unwrap();

    assert_eq!(store.list_len("prod:queue:enqueue2").await, 1);
    assert_eq!(store.sorted_set_len(SCHEDULE).await, 0);
    assert_eq!(store.open_sessions(), 0);
}

#[tokio::test]
async fn enqueue_saves_class_args_and_jid() {
    let enqueuer = enqueuer();
    let jid = enqueuer
        .enqueue("enqueue3", "Compare", &["foo", "bar"])
        .await
        .unwrap();

    let saved = pop_record(enqueuer.store(), "prod:queue:enqueue3").await;
    assert_eq!(saved.get(keys::CLASS).as_str().unwrap(), "Compare");
    assert_eq!(saved.get(keys::QUEUE).as_str().unwrap(), "enqueue3");
    assert_eq!(saved.get(keys::ARGS).value().unwrap(), &json!(["foo", "bar"]));
    assert_eq!(saved.get(keys::JID).as_str().unwrap(), jid);
    assert_eq!(jid.len(), 24);
    assert!(jid.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
}

#[tokio::test]
async fn enqueue_sets_timestamps_close_to_now() {
    let enqueuer = enqueuer();
    enqueuer
        .enqueue("emails", "Send", &json!({"to": "a@b.com"}))
        .await
        .unwrap();

    let saved = pop_record(enqueuer.store(), "prod:queue:emails").await;
    let enqueued_at = saved.get(keys::ENQUEUED_AT).as_f64().unwrap();
    let at = saved.get(keys::AT).as_f64().unwrap();
    assert_ne!(enqueued_at, 0.0);
    assert!(is_close(enqueued_at, now_seconds()));
    assert!(is_close(at, now_seconds()));
    assert!(!saved.contains_key(keys::RETRY));
    assert!(!saved.contains_key(keys::RETRY_COUNT));
    assert!(!saved.contains_key(keys::MAX_ATTEMPTS));
}

#[tokio::test]
async fn enqueue_with_options_keeps_retry_fields() {
    let enqueuer = enqueuer();
    let options = EnqueueOptions::new()
        .retry_count(13)
        .retry(true)
        .max_attempts(98);
    enqueuer
        .enqueue_with_options("enqueue6", "Compare", &["foo", "bar"], options)
        .await
        .unwrap();

    let saved = pop_record(enqueuer.store(), "prod:queue:enqueue6").await;
    assert!(saved.get(keys::RETRY).as_bool().unwrap());
    assert_eq!(saved.get(keys::RETRY_COUNT).as_i64().unwrap(), 13);
    assert_eq!(saved.get(keys::MAX_ATTEMPTS).as_i64().unwrap(), 98);
}

#[tokio::test]
async fn enqueue_keeps_insertion_order() {
    let enqueuer = enqueuer();
    let first = enqueuer.enqueue("fifo", "A", &1).await.unwrap();
    let second = enqueuer.enqueue("fifo", "B", &2).await.unwrap();

    let store = enqueuer.store();
    let head = pop_record(store, "prod:queue:fifo").await;
    let tail = pop_record(store, "prod:queue:fifo").await;
    assert_eq!(head.get(keys::JID).as_str().unwrap(), first);
    assert_eq!(tail.get(keys::JID).as_str().unwrap(), second);
}

#[tokio::test]
async fn enqueue_in_goes_to_the_schedule() {
    let enqueuer = enqueuer();
    let store = enqueuer.store();
    let before = now_seconds();

    let jid = enqueuer
        .enqueue_in("enqueuein1", "Compare", 30.0, &json!({"foo": "bar"}))
        .await
        .unwrap();

    assert_eq!(store.sorted_set_len(SCHEDULE).await, 1);
    assert_eq!(store.list_len("prod:queue:enqueuein1").await, 0);
    assert!(!store.is_member(QUEUES, "enqueuein1").await);

    let entry = store.sorted_set_range(SCHEDULE).await.remove(0);
    assert!(entry.score >= before + 30.0);
    assert!(is_close(entry.score, now_seconds() + 30.0));

    let saved = JobRecord::from_slice(&entry.member).unwrap();
    assert_eq!(saved.get(keys::QUEUE).as_str().unwrap(), "enqueuein1");
    assert_eq!(saved.get(keys::JID).as_str().unwrap(), jid);
    assert_eq!(saved.get(keys::AT).as_f64().unwrap(), entry.score);
}

#[tokio::test]
async fn enqueue_at_routes_on_the_timestamp() {
    let enqueuer = enqueuer();
    let store = enqueuer.store();

    let past = Utc::now() - Duration::seconds(5);
    enqueuer.enqueue_at("at-queue", "Late", past, &()).await.unwrap();
    assert_eq!(store.list_len("prod:queue:at-queue").await, 1);

    let future = Utc::now() + Duration::hours(1);
    enqueuer.enqueue_at("at-queue", "Later", future, &()).await.unwrap();
    assert_eq!(store.list_len("prod:queue:at-queue").await, 1);
    assert_eq!(store.sorted_set_len(SCHEDULE).await, 1);

    let entry = store.sorted_set_range(SCHEDULE).await.remove(0);
    assert!((entry.score - jobhub_enqueue::time::to_seconds(future)).abs() < 1e-6);
}

#[tokio::test]
async fn scheduled_jobs_are_ordered_by_at() {
    let enqueuer = enqueuer();
    let now = now_seconds();
    for (class, delay) in [("C", 300.0), ("A", 100.0), ("B", 200.0)] {
        let options = EnqueueOptions::new().at(now + delay);
        enqueuer
            .enqueue_with_options("later", class, &(), options)
            .await
            .unwrap();
    }

    let classes: Vec<String> = enqueuer
        .store()
        .sorted_set_range(SCHEDULE)
        .await
        .into_iter()
        .map(|e| {
            let record = JobRecord::from_slice(&e.member).unwrap();
            record.get(keys::CLASS).as_str().unwrap().to_owned()
        })
        .collect();
    assert_eq!(classes, ["A", "B", "C"]);
}

#[tokio::test]
async fn unserializable_args_write_nothing() {
    use std::collections::HashMap;

    let enqueuer = enqueuer();
    let mut args = HashMap::new();
    args.insert(vec![1u8], "tuple keys are not json");

    let err = enqueuer.enqueue("bad-args", "C", &args).await.unwrap_err();
    assert!(matches!(err, EnqueueError::Serialization(_)));
    assert!(enqueuer.store().set_members(QUEUES).await.is_empty());
    assert_eq!(enqueuer.store().open_sessions(), 0);
}

// ---------------------------------------------------------------------------
// prepared records
// ---------------------------------------------------------------------------

#[tokio::test]
async fn prepare_record_does_not_dispatch() {
    let enqueuer = enqueuer();
    let args = json!({"foo": "bar", "baz": true});
    let record = enqueuer
        .prepare_record("ququ-queue", "QuquClass", &args, EnqueueOptions::new())
        .unwrap();

    assert_eq!(record.get(keys::QUEUE).as_str().unwrap(), "ququ-queue");
    assert_eq!(record.get(keys::CLASS).as_str().unwrap(), "QuquClass");
    let stored_args = record.get(keys::ARGS).as_object().unwrap();
    assert_eq!(stored_args.len(), 2);
    assert_eq!(stored_args["foo"], "bar");
    assert_eq!(stored_args["baz"], true);
    assert_eq!(record.get(keys::JID).as_str().unwrap().len(), 24);
    assert!(is_close(record.get(keys::AT).as_f64().unwrap(), now_seconds()));

    assert!(enqueuer.store().set_members(QUEUES).await.is_empty());
    assert_eq!(enqueuer.store().list_len("prod:queue:ququ-queue").await, 0);
}

#[tokio::test]
async fn prepared_record_forwards_through_the_raw_path() {
    let enqueuer = enqueuer();
    let options = EnqueueOptions::new().retry(true).retry_count(17);
    let mut record = enqueuer
        .prepare_record("forward", "Fwd", &[1, 2, 3], options)
        .unwrap();
    let prepared_keys: Vec<String> = record.keys().map(str::to_owned).collect();
    let prepared_jid = record.get(keys::JID).as_str().unwrap().to_owned();

    let jid = enqueuer.enqueue_record(&mut record).await.unwrap();
    assert_eq!(jid, prepared_jid);

    let saved = pop_record(enqueuer.store(), "prod:queue:forward").await;
    let saved_keys: Vec<&str> = saved.keys().collect();
    assert_eq!(saved_keys, prepared_keys);
    assert_eq!(saved.get(keys::RETRY_COUNT).as_i64().unwrap(), 17);
}

// ---------------------------------------------------------------------------
// raw path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn enqueue_record_makes_the_queue_available() {
    let enqueuer = enqueuer();
    let mut record: JobRecord = r#"{"jid":"1", "queue": "q1"}"#.parse().unwrap();

    let jid = enqueuer.enqueue_record(&mut record).await.unwrap();
    assert_eq!(jid, "1");

    let store = enqueuer.store();
    assert!(store.is_member(QUEUES, "q1").await);
    let saved = pop_record(store, "prod:queue:q1").await;
    assert_eq!(saved.get(keys::JID).as_str().unwrap(), "1");
    assert!(is_close(saved.get(keys::AT).as_f64().unwrap(), now_seconds()));
    assert!(is_close(
        saved.get(keys::ENQUEUED_AT).as_f64().unwrap(),
        now_seconds()
    ));
}

#[tokio::test]
async fn enqueue_record_saves_the_message_as_is() {
    let enqueuer = enqueuer();
    let raw = format!(
        r#"{{"jid":"3", "vava": true, "queue": "enqueue3", "at": {}, "x-field": {{"one": "1", "two": "_2_"}}}}"#,
        now_seconds()
    );
    let mut record: JobRecord = raw.parse().unwrap();
    let original = record.clone();

    enqueuer.enqueue_record(&mut record).await.unwrap();

    let saved = pop_record(enqueuer.store(), "prod:queue:enqueue3").await;
    assert_eq!(saved.get("jid").as_str(), original.get("jid").as_str());
    assert_eq!(saved.get("queue").as_str(), original.get("queue").as_str());
    assert_eq!(saved.get("at").as_f64(), original.get("at").as_f64());
    assert!(saved.get("vava").as_bool().unwrap());
    let xfield = saved.get("x-field").as_object().unwrap();
    assert_eq!(xfield.len(), 2);
    assert_eq!(xfield["one"], "1");
    assert_eq!(xfield["two"], "_2_");
    assert_eq!(
        saved.keys().collect::<Vec<_>>(),
        ["jid", "vava", "queue", "at", "x-field", "enqueued_at"]
    );
}

#[tokio::test]
async fn enqueue_record_writes_back_completed_fields() {
    let enqueuer = enqueuer();
    let mut record: JobRecord = format!(r#"{{"queue": "enqueue5", "at": {}}}"#, now_seconds())
        .parse()
        .unwrap();

    enqueuer.enqueue_record(&mut record).await.unwrap();

    let saved = pop_record(enqueuer.store(), "prod:queue:enqueue5").await;
    let jid = record.get(keys::JID).as_str().unwrap();
    assert_eq!(jid.len(), 24);
    assert_eq!(saved.get(keys::JID).as_str().unwrap(), jid);

    let enqueued_at = record.get(keys::ENQUEUED_AT).as_f64().unwrap();
    assert!(is_close(enqueued_at, now_seconds()));
    assert_eq!(saved.get(keys::ENQUEUED_AT).as_f64().unwrap(), enqueued_at);
}

#[tokio::test]
async fn enqueue_record_overwrites_enqueued_at() {
    let enqueuer = enqueuer();
    let mut record: JobRecord = r#"{"jid":"4", "queue": "q4", "enqueued_at": 1.0}"#
        .parse()
        .unwrap();

    enqueuer.enqueue_record(&mut record).await.unwrap();

    let saved = pop_record(enqueuer.store(), "prod:queue:q4").await;
    assert!(is_close(
        saved.get(keys::ENQUEUED_AT).as_f64().unwrap(),
        now_seconds()
    ));
}

#[tokio::test]
async fn enqueue_record_with_future_at_is_scheduled() {
    let enqueuer = enqueuer();
    let at = now_seconds() + 60.0;
    let mut record: JobRecord = format!(r#"{{"jid":"9", "queue": "later", "at": {at}}}"#)
        .parse()
        .unwrap();

    enqueuer.enqueue_record(&mut record).await.unwrap();

    let store = enqueuer.store();
    assert!(!store.is_member(QUEUES, "later").await);
    let entries = store.sorted_set_range(SCHEDULE).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].score, record.get(keys::AT).as_f64().unwrap());
}

#[tokio::test]
async fn enqueue_record_due_exactly_now_goes_to_the_queue() {
    let enqueuer = enqueuer();
    let at = now_seconds();
    let mut record: JobRecord = r#"{"jid": "8", "queue": "edge"}"#.parse().unwrap();
    record.set(keys::AT, at);

    enqueuer.enqueue_record(&mut record).await.unwrap();

    let store = enqueuer.store();
    assert!(store.is_member(QUEUES, "edge").await);
    assert_eq!(store.list_len("prod:queue:edge").await, 1);
    assert_eq!(store.sorted_set_len(SCHEDULE).await, 0);

    let saved = pop_record(store, "prod:queue:edge").await;
    assert_eq!(saved.get(keys::AT).as_f64().unwrap(), at);
}

#[tokio::test]
async fn enqueue_record_twice_only_changes_enqueued_at() {
    let enqueuer = enqueuer();
    let mut record: JobRecord = r#"{"jid":"6", "queue": "twice", "at": 1700000000.25}"#
        .parse()
        .unwrap();

    enqueuer.enqueue_record(&mut record).await.unwrap();
    enqueuer.enqueue_record(&mut record).await.unwrap();

    let store = enqueuer.store();
    let first = pop_record(store, "prod:queue:twice").await;
    let second = pop_record(store, "prod:queue:twice").await;
    for saved in [&first, &second] {
        assert_eq!(saved.get(keys::JID).as_str().unwrap(), "6");
        assert_eq!(saved.get(keys::AT).value().unwrap(), &json!(1700000000.25));
    }

    let mut first = first;
    let mut second = second;
    first.remove(keys::ENQUEUED_AT);
    second.remove(keys::ENQUEUED_AT);
    assert_eq!(first.encode().unwrap(), second.encode().unwrap());
}

#[tokio::test]
async fn enqueue_record_rejects_a_missing_queue() {
    let enqueuer = enqueuer();
    let mut record: JobRecord = r#"{"jid":"7"}"#.parse().unwrap();
    let original = record.clone();

    let err = enqueuer.enqueue_record(&mut record).await.unwrap_err();
    assert!(matches!(err, EnqueueError::BadQueue(ref e) if e.is_missing()));
    assert!(err.is_validation());
    assert_eq!(record, original);

    let store = enqueuer.store();
    assert!(store.set_members(QUEUES).await.is_empty());
    assert_eq!(store.sorted_set_len(SCHEDULE).await, 0);
    assert_eq!(store.open_sessions(), 0);
}

#[tokio::test]
async fn enqueue_record_rejects_malformed_fields() {
    let enqueuer = enqueuer();

    let mut bad_jid: JobRecord = r#"{"jid": 12, "queue": "q"}"#.parse().unwrap();
    let err = enqueuer.enqueue_record(&mut bad_jid).await.unwrap_err();
    assert!(matches!(err, EnqueueError::BadJid(ref e) if !e.is_missing()));

    let mut bad_at: JobRecord = r#"{"queue": "q", "at": "tomorrow"}"#.parse().unwrap();
    let err = enqueuer.enqueue_record(&mut bad_at).await.unwrap_err();
    assert!(matches!(err, EnqueueError::BadAt(_)));

    let mut empty_jid: JobRecord = r#"{"jid": "", "queue": "q"}"#.parse().unwrap();
    let original = empty_jid.clone();
    let err = enqueuer.enqueue_record(&mut empty_jid).await.unwrap_err();
    assert!(matches!(err, EnqueueError::EmptyJid));
    assert!(err.is_validation());
    assert_eq!(empty_jid, original);

    assert!(enqueuer.store().set_members(QUEUES).await.is_empty());
    assert_eq!(enqueuer.store().list_len("prod:queue:q").await, 0);
}

// ---------------------------------------------------------------------------
// store failures
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemoryStore,
    refuse_acquire: bool,
    fail_push: bool,
}

struct FlakySession {
    inner: MemorySession,
    fail_push: bool,
}

#[async_trait]
impl JobStore for FlakyStore {
    type Session = FlakySession;

    async fn acquire(&self) -> Result<Self::Session, StoreError> {
        if self.refuse_acquire {
            return Err(StoreError::Connection("pool timed out".into()));
        }
        Ok(FlakySession {
            inner: self.inner.acquire().await?,
            fail_push: self.fail_push,
        })
    }
}

#[async_trait]
impl StoreSession for FlakySession {
    async fn add_to_set(&mut self, key: &str, member: &str) -> Result<(), StoreError> {
        self.inner.add_to_set(key, member).await
    }

    async fn push_to_list(&mut self, key: &str, payload: &[u8]) -> Result<(), StoreError> {
        if self.fail_push {
            return Err(StoreError::Command("READONLY replica".into()));
        }
        self.inner.push_to_list(key, payload).await
    }

    async fn add_to_sorted_set(
        &mut self,
        key: &str,
        score: f64,
        payload: &[u8],
    ) -> Result<(), StoreError> {
        self.inner.add_to_sorted_set(key, score, payload).await
    }
}

#[tokio::test]
async fn failed_append_leaves_the_registry_entry() {
    init_tracing();
    let store = FlakyStore {
        fail_push: true,
        ..Default::default()
    };
    let enqueuer = Enqueuer::new(store.clone(), EnqueueConfig::default());

    let err = enqueuer.enqueue("partial", "C", &()).await.unwrap_err();
    assert!(err.is_store());
    assert!(store.inner.is_member("queues", "partial").await);
    assert_eq!(store.inner.list_len("queue:partial").await, 0);
    assert_eq!(store.inner.open_sessions(), 0);
}

#[tokio::test]
async fn unavailable_store_is_reported() {
    init_tracing();
    let store = FlakyStore {
        refuse_acquire: true,
        ..Default::default()
    };
    let enqueuer = Enqueuer::new(store.clone(), EnqueueConfig::default());

    let mut record: JobRecord = r#"{"queue": "q"}"#.parse().unwrap();
    let err = enqueuer.enqueue_record(&mut record).await.unwrap_err();
    assert!(matches!(err, EnqueueError::Store(StoreError::Connection(_))));
    assert!(store.inner.set_members("queues").await.is_empty());
}

#[tokio::test]
async fn scheduling_does_not_need_the_list() {
    let store = FlakyStore {
        fail_push: true,
        ..Default::default()
    };
    let enqueuer = Enqueuer::new(store.clone(), EnqueueConfig::default());

    enqueuer.enqueue_in("later", "C", 10.0, &()).await.unwrap();
    assert_eq!(store.inner.sorted_set_len("schedule").await, 1);
}

// ---------------------------------------------------------------------------
// concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_enqueues_all_land() {
    let enqueuer = enqueuer();
    let mut handles = Vec::new();
    for i in 0..32 {
        let enqueuer = enqueuer.clone();
        handles.push(tokio::spawn(async move {
            enqueuer.enqueue("busy", "Work", &json!({"n": i})).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let store = enqueuer.store();
    assert_eq!(store.list_len("prod:queue:busy").await, 32);
    assert_eq!(store.set_members(QUEUES).await, ["busy"]);
    assert_eq!(store.open_sessions(), 0);
}
