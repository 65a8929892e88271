//! Local capture side of the outbox.
//!
//! [`EventPublisher::enqueue`] is called from request handlers on the hot
//! path, so it never surfaces an error to the caller. Failures are logged
//! and counted; the sale has already happened and must not be rolled back
//! because the sync queue hiccupped.

use std::sync::Arc;

use metrics::counter;
use uuid::Uuid;

use super::clock::Clock;
use super::event::{NewEvent, OutboxEvent};
use super::store::EventStore;
use super::{DEFAULT_MAX_ATTEMPTS, DEFAULT_QUEUE_CAP};
use crate::error::Result;

/// Writes captured events into the store and enforces the per-location cap.
pub struct EventPublisher {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    queue_cap: i64,
    max_attempts: i32,
}

impl EventPublisher {
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            queue_cap: DEFAULT_QUEUE_CAP,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_queue_cap(mut self, queue_cap: i64) -> Self {
        self.queue_cap = queue_cap;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Record an event for later delivery. Infallible from the caller's
    /// point of view: storage errors are swallowed after logging.
    pub async fn enqueue(&self, new: NewEvent) {
        let event_id = new.id;
        let location_id = new.location_id;
        if let Err(err) = self.try_enqueue(new).await {
            err.record_metrics();
            counter!("relay_enqueue_failures_total").increment(1);
            tracing::error!(
                target: "outbox",
                %event_id,
                %location_id,
                error = %err,
                "failed to enqueue event"
            );
        }
    }

    async fn try_enqueue(&self, new: NewEvent) -> Result<()> {
        let location_id = new.location_id;
        let event = OutboxEvent::new(new, self.max_attempts, self.clock.now());
        self.store.create(&event).await?;
        counter!("relay_events_enqueued_total").increment(1);

        self.enforce_cap(location_id).await
    }

    /// Evict oldest events when a location exceeds its cap.
    ///
    /// The cap is hard: eviction goes by age alone and will drop undelivered
    /// or in-flight events under a long enough backlog. Bounded storage wins
    /// over perfect delivery during a sustained outage.
    async fn enforce_cap(&self, location_id: Uuid) -> Result<()> {
        let count = self.store.count_active(location_id).await?;
        if count <= self.queue_cap {
            return Ok(());
        }

        let excess = count - self.queue_cap;
        let victims = self.store.find_oldest(location_id, excess).await?;
        let removed = self.store.delete_many(location_id, &victims).await?;
        counter!("relay_events_evicted_total").increment(removed);
        tracing::warn!(
            target: "outbox",
            %location_id,
            removed,
            cap = self.queue_cap,
            "evicted oldest events over location cap"
        );
        Ok(())
    }
}
