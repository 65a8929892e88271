//! End-to-end delivery tests against a mock ingest endpoint.
//!
//! These drive the publisher, store, and worker with a manual clock so every
//! retry delay is asserted exactly, without sleeping.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pos_relay::config::SyncConfig;
use pos_relay::outbox::{
    Clock, DeliveryWorker, EventPublisher, EventStatus, EventStore, InMemoryEventStore,
    ManualClock, NewEvent, OutboxEvent, SyncScheduler,
};
use pos_relay::signing::verify_signature;
use pos_relay::{RelayError, Result};

const SECRET: &str = "test-secret";
const NODE_ID: &str = "node-test";

struct Harness {
    store: Arc<InMemoryEventStore>,
    clock: Arc<ManualClock>,
    publisher: EventPublisher,
    worker: DeliveryWorker,
}

fn harness(server_uri: String) -> Harness {
    let store = Arc::new(InMemoryEventStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let config = SyncConfig {
        cloud_base_url: server_uri,
        signing_secret: SECRET.to_string(),
        node_id: NODE_ID.to_string(),
        ..Default::default()
    };
    let publisher = EventPublisher::new(store.clone(), clock.clone());
    let worker = DeliveryWorker::new(store.clone(), clock.clone(), &config).expect("build worker");
    Harness {
        store,
        clock,
        publisher,
        worker,
    }
}

fn new_event(location_id: Uuid) -> NewEvent {
    NewEvent {
        id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        location_id,
        event_type: "payment.captured".to_string(),
        body: json!({"amount_cents": 1250, "currency": "EUR"}),
    }
}

#[tokio::test]
async fn event_completes_after_transient_failures() {
    let server = MockServer::start().await;

    // First four attempts are rejected, the fifth succeeds
    Mock::given(method("POST"))
        .and(path("/events/ingest"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(4)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/events/ingest"))
        .and(header("X-Node-Id", NODE_ID))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let h = harness(server.uri());
    let new = new_event(Uuid::new_v4());
    let id = new.id;
    h.publisher.enqueue(new).await;

    // Delay doubles per failed attempt: 2s, 4s, 8s, 16s
    for (attempt, delay_ms) in [(1, 2_000i64), (2, 4_000), (3, 8_000), (4, 16_000)] {
        h.worker.run_cycle().await;
        let event = h.store.get(id).await.unwrap();
        assert_eq!(event.status, EventStatus::Failed);
        assert_eq!(event.attempts, attempt);
        assert_eq!(
            (event.next_retry_at - h.clock.now()).num_milliseconds(),
            delay_ms
        );
        h.clock.advance(chrono::Duration::milliseconds(delay_ms));
    }

    h.worker.run_cycle().await;
    let event = h.store.get(id).await.unwrap();
    assert_eq!(event.status, EventStatus::Completed);
    assert_eq!(event.attempts, 4);
    assert!(event.synced_at.is_some());
    assert!(event.deleted_at.is_some());

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 5);
}

#[tokio::test]
async fn exhausted_event_is_dead_lettered_without_a_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events/ingest"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let h = harness(server.uri());
    let new = new_event(Uuid::new_v4());
    let id = new.id;
    h.publisher.enqueue(new).await;

    // Burn through the whole attempt budget
    for _ in 0..5 {
        h.worker.run_cycle().await;
        h.clock.advance(chrono::Duration::hours(1));
    }
    let event = h.store.get(id).await.unwrap();
    assert_eq!(event.status, EventStatus::Failed);
    assert_eq!(event.attempts, 5);

    // The sixth pickup dead-letters without touching the network
    h.worker.run_cycle().await;
    let event = h.store.get(id).await.unwrap();
    assert_eq!(event.status, EventStatus::DeadLetter);
    assert!(event.last_error.is_some());
    assert_eq!(server.received_requests().await.unwrap().len(), 5);

    // Dead-lettered events are never picked up again
    h.clock.advance(chrono::Duration::hours(1));
    h.worker.run_cycle().await;
    assert_eq!(server.received_requests().await.unwrap().len(), 5);
}

#[tokio::test]
async fn queue_cap_evicts_oldest_per_location() {
    let server = MockServer::start().await;
    let h = harness(server.uri());

    let busy = Uuid::new_v4();
    let quiet = Uuid::new_v4();
    for _ in 0..3 {
        h.publisher.enqueue(new_event(quiet)).await;
        h.clock.advance(chrono::Duration::milliseconds(1));
    }

    let mut ids = Vec::new();
    for _ in 0..1005 {
        let new = new_event(busy);
        ids.push(new.id);
        h.publisher.enqueue(new).await;
        h.clock.advance(chrono::Duration::milliseconds(1));
    }

    assert_eq!(h.store.count_active(busy).await.unwrap(), 1000);
    for id in &ids[..5] {
        assert!(h.store.get(*id).await.is_none());
    }
    for id in &ids[5..] {
        assert!(h.store.get(*id).await.is_some());
    }
    assert_eq!(h.store.count_active(quiet).await.unwrap(), 3);
}

#[tokio::test]
async fn delivered_payload_is_signed_and_verifiable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events/ingest"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let h = harness(server.uri());
    h.publisher.enqueue(new_event(Uuid::new_v4())).await;
    h.worker.run_cycle().await;

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let request = &received[0];

    let signature = request
        .headers
        .get("X-Request-Signature")
        .map(|v| v.to_str().unwrap_or("").to_string())
        .unwrap_or_default();
    assert!(verify_signature(&signature, SECRET, &request.body));

    let envelope: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(envelope["event_type"], "payment.captured");
    assert_eq!(envelope["body"]["amount_cents"], 1250);
}

struct FailingStore;

#[async_trait]
impl EventStore for FailingStore {
    async fn create(&self, _event: &OutboxEvent) -> Result<()> {
        Err(RelayError::Configuration("store offline".to_string()))
    }
    async fn count_active(&self, _location_id: Uuid) -> Result<i64> {
        Err(RelayError::Configuration("store offline".to_string()))
    }
    async fn find_oldest(&self, _location_id: Uuid, _limit: i64) -> Result<Vec<Uuid>> {
        Err(RelayError::Configuration("store offline".to_string()))
    }
    async fn delete_many(&self, _location_id: Uuid, _ids: &[Uuid]) -> Result<u64> {
        Err(RelayError::Configuration("store offline".to_string()))
    }
    async fn find_due(&self, _now: DateTime<Utc>, _limit: i64) -> Result<Vec<OutboxEvent>> {
        Err(RelayError::Configuration("store offline".to_string()))
    }
    async fn update(&self, _event: &OutboxEvent) -> Result<()> {
        Err(RelayError::Configuration("store offline".to_string()))
    }
}

#[tokio::test]
async fn enqueue_swallows_store_failures() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let publisher = EventPublisher::new(Arc::new(FailingStore), clock);
    // Must not panic or propagate even though every store call fails
    publisher.enqueue(new_event(Uuid::new_v4())).await;
}

#[tokio::test]
async fn scheduler_drives_delivery_cycles() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events/ingest"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryEventStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let config = SyncConfig {
        cloud_base_url: server.uri(),
        signing_secret: SECRET.to_string(),
        node_id: NODE_ID.to_string(),
        ..Default::default()
    };
    let publisher = EventPublisher::new(store.clone(), clock.clone());
    let worker = DeliveryWorker::new(store.clone(), clock, &config).expect("build worker");
    let scheduler = SyncScheduler::new(Arc::new(worker), Duration::from_millis(20));

    let new = new_event(Uuid::new_v4());
    let id = new.id;
    publisher.enqueue(new).await;

    assert!(scheduler.start());
    tokio::time::sleep(Duration::from_millis(200)).await;
    scheduler.stop();

    let event = store.get(id).await.unwrap();
    assert_eq!(event.status, EventStatus::Completed);
}
