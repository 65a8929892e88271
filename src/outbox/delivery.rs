//! Delivery worker: drains due events to the cloud ingest endpoint.
//!
//! Events are processed sequentially, oldest first, so a location's events
//! arrive in capture order within a cycle. The `processing` transition is
//! persisted before the HTTP call but is not crash-durable in any stronger
//! sense: if the process dies mid-call the row stays `processing` and is
//! skipped by the due query. A single relay process per store is assumed;
//! re-delivery after an ambiguous outcome is safe because the cloud side
//! dedupes on event id.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::backoff::BackoffPolicy;
use super::clock::Clock;
use super::event::OutboxEvent;
use super::store::EventStore;
use crate::config::SyncConfig;
use crate::error::{RelayError, Result};
use crate::signing::sign_payload;

/// Wire shape posted to the ingest endpoint.
#[derive(Debug, Serialize)]
struct EventEnvelope<'a> {
    id: Uuid,
    tenant_id: Uuid,
    location_id: Uuid,
    event_type: &'a str,
    created_at: DateTime<Utc>,
    body: &'a Value,
}

fn ingest_url(base: &str) -> String {
    format!("{}/events/ingest", base.trim_end_matches('/'))
}

/// Pulls due events from the store and posts them to the cloud.
pub struct DeliveryWorker {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    http: reqwest::Client,
    ingest_url: String,
    node_id: String,
    signing_secret: String,
    batch_size: i64,
    backoff: BackoffPolicy,
    http_timeout: Duration,
}

impl DeliveryWorker {
    pub fn new(
        store: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
        config: &SyncConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("pos-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            store,
            clock,
            http,
            ingest_url: ingest_url(&config.cloud_base_url),
            node_id: config.node_id.clone(),
            signing_secret: config.signing_secret.clone(),
            batch_size: config.batch_size,
            backoff: BackoffPolicy::new(config.base_backoff, config.max_backoff),
            http_timeout: config.http_timeout,
        })
    }

    /// One poll cycle: fetch a due batch and attempt each event in order.
    ///
    /// A failed batch query is logged and counted but does not propagate;
    /// the scheduler will try again on the next tick.
    pub async fn run_cycle(&self) {
        let batch = match self.store.find_due(self.clock.now(), self.batch_size).await {
            Ok(batch) => batch,
            Err(err) => {
                err.record_metrics();
                counter!("relay_cycle_errors_total").increment(1);
                tracing::error!(
                    target: "outbox_delivery",
                    error = %err,
                    "failed to fetch due events"
                );
                return;
            }
        };

        for event in batch {
            if let Err(err) = self.process_event(event).await {
                err.record_metrics();
                counter!("relay_cycle_errors_total").increment(1);
                tracing::error!(
                    target: "outbox_delivery",
                    error = %err,
                    "failed to persist event transition"
                );
            }
        }
    }

    /// Attempt one event. Returns Err only when a store write fails; the
    /// HTTP outcome itself is absorbed into the event's state.
    async fn process_event(&self, mut event: OutboxEvent) -> Result<()> {
        if event.is_exhausted() {
            event.mark_dead_letter();
            self.store.update(&event).await?;
            counter!("relay_events_dead_lettered_total").increment(1);
            tracing::warn!(
                target: "outbox_delivery",
                event_id = %event.id,
                location_id = %event.location_id,
                attempts = event.attempts,
                "event exhausted retries, moved to dead letter"
            );
            return Ok(());
        }

        event.mark_processing();
        self.store.update(&event).await?;

        match self.send(&event).await {
            Ok(()) => {
                event.mark_completed(self.clock.now());
                self.store.update(&event).await?;
                counter!("relay_events_delivered_total").increment(1);
                tracing::info!(
                    target: "outbox_delivery",
                    event_id = %event.id,
                    event_type = %event.event_type,
                    attempts = event.attempts,
                    "event delivered"
                );
            }
            Err(err) => {
                let next_retry_at = self.backoff.next_retry_at(self.clock.now(), event.attempts + 1);
                event.mark_failed(&err.to_string(), next_retry_at);
                self.store.update(&event).await?;
                err.record_metrics();
                counter!("relay_delivery_failures_total").increment(1);
                tracing::warn!(
                    target: "outbox_delivery",
                    event_id = %event.id,
                    attempts = event.attempts,
                    next_retry_at = %next_retry_at,
                    error = %err,
                    "delivery attempt failed"
                );
            }
        }
        Ok(())
    }

    /// Serialize, sign and post one event. Any non-2xx status is an error.
    async fn send(&self, event: &OutboxEvent) -> Result<()> {
        let envelope = EventEnvelope {
            id: event.id,
            tenant_id: event.tenant_id,
            location_id: event.location_id,
            event_type: &event.event_type,
            created_at: event.created_at,
            body: &event.body,
        };
        let payload = serde_json::to_vec(&envelope)?;
        let signature = sign_payload(&self.signing_secret, &payload);

        let response = self
            .http
            .post(&self.ingest_url)
            .header("X-Node-Id", &self.node_id)
            .header("X-Request-Signature", signature)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RelayError::Timeout(self.http_timeout)
                } else {
                    RelayError::Transport(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
