//! Event store contract and the in-memory implementation.
//!
//! The Postgres implementation lives in [`crate::db`]; the in-memory one here
//! backs tests and development. All mutations are single-row updates keyed by
//! event id, so the contract needs no multi-row transactions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::event::OutboxEvent;
use crate::error::{RelayError, Result};

/// Durable CRUD over queued events.
///
/// Cap and eviction operations (`count_active`, `find_oldest`, `delete_many`)
/// are scoped to a single `location_id` and must never touch other locations.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert a new event. Fails on a duplicate id; never updates in place.
    async fn create(&self, event: &OutboxEvent) -> Result<()>;

    /// Count non-deleted events for a location.
    async fn count_active(&self, location_id: Uuid) -> Result<i64>;

    /// Ids of the `limit` oldest non-deleted events for a location, by
    /// `created_at` ascending.
    async fn find_oldest(&self, location_id: Uuid, limit: i64) -> Result<Vec<Uuid>>;

    /// Physically remove the given events, scoped to the location. Returns
    /// the number of rows removed.
    async fn delete_many(&self, location_id: Uuid, ids: &[Uuid]) -> Result<u64>;

    /// Up to `limit` events with `status in (pending, failed)` and
    /// `next_retry_at <= now`, oldest first, across all locations.
    async fn find_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<OutboxEvent>>;

    /// Persist the current state of an event, keyed by id.
    async fn update(&self, event: &OutboxEvent) -> Result<()>;
}

/// In-memory event store for testing and development.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: RwLock<Vec<OutboxEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch an event by id, deleted or not.
    pub async fn get(&self, id: Uuid) -> Option<OutboxEvent> {
        self.events.read().await.iter().find(|e| e.id == id).cloned()
    }

    /// Snapshot of every stored event.
    pub async fn all(&self) -> Vec<OutboxEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn create(&self, event: &OutboxEvent) -> Result<()> {
        let mut events = self.events.write().await;
        if events.iter().any(|e| e.id == event.id) {
            return Err(RelayError::DuplicateEvent(event.id));
        }
        events.push(event.clone());
        Ok(())
    }

    async fn count_active(&self, location_id: Uuid) -> Result<i64> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| e.location_id == location_id && e.deleted_at.is_none())
            .count() as i64)
    }

    async fn find_oldest(&self, location_id: Uuid, limit: i64) -> Result<Vec<Uuid>> {
        let events = self.events.read().await;
        let mut active: Vec<&OutboxEvent> = events
            .iter()
            .filter(|e| e.location_id == location_id && e.deleted_at.is_none())
            .collect();
        active.sort_by_key(|e| e.created_at);
        Ok(active
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|e| e.id)
            .collect())
    }

    async fn delete_many(&self, location_id: Uuid, ids: &[Uuid]) -> Result<u64> {
        let mut events = self.events.write().await;
        let before = events.len();
        events.retain(|e| !(e.location_id == location_id && ids.contains(&e.id)));
        Ok((before - events.len()) as u64)
    }

    async fn find_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<OutboxEvent>> {
        let events = self.events.read().await;
        let mut due: Vec<OutboxEvent> = events
            .iter()
            .filter(|e| e.deleted_at.is_none() && e.status.is_due() && e.next_retry_at <= now)
            .cloned()
            .collect();
        due.sort_by_key(|e| e.created_at);
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn update(&self, event: &OutboxEvent) -> Result<()> {
        let mut events = self.events.write().await;
        match events.iter_mut().find(|e| e.id == event.id) {
            Some(existing) => {
                *existing = event.clone();
                Ok(())
            }
            None => Err(RelayError::EventNotFound(event.id)),
        }
    }
}
