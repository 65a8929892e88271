//! Outbox event records and their state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::RelayError;

/// Status of a queued event.
///
/// `pending` is initial; `completed` and `dead_letter` are terminal.
/// `processing` is only ever transient — it is not recovered automatically
/// after a crash (see the module docs in [`super::delivery`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Waiting for its first delivery attempt
    Pending,
    /// A delivery attempt is in flight
    Processing,
    /// Delivered successfully (row is soft-deleted)
    Completed,
    /// Last attempt failed; eligible again once `next_retry_at` passes
    Failed,
    /// Attempts exhausted; held for operator inspection, never retried
    DeadLetter,
}

impl EventStatus {
    /// Check if the event is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::DeadLetter)
    }

    /// Check if the event is selectable by the due-batch query.
    pub fn is_due(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::DeadLetter => "dead_letter",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "dead_letter" => Ok(Self::DeadLetter),
            other => Err(RelayError::InvalidStatus(other.to_string())),
        }
    }
}

/// Input to [`super::EventPublisher::enqueue`].
///
/// `id` is caller-supplied and doubles as the idempotency key on the cloud
/// side, so re-delivery after an ambiguous failure is safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    pub event_type: String,
    pub body: serde_json::Value,
}

/// A durable unit of cloud-bound work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    /// Caller-supplied unique identifier (idempotency key)
    pub id: Uuid,
    /// Owning venue
    pub tenant_id: Uuid,
    /// Partition key for caps, eviction, and counts
    pub location_id: Uuid,
    /// Business event kind, opaque to the queue
    pub event_type: String,
    /// Structured payload, opaque to the queue
    pub body: serde_json::Value,
    /// Current state
    pub status: EventStatus,
    /// Delivery attempts made so far
    pub attempts: i32,
    /// Ceiling after which the event is dead-lettered
    pub max_attempts: i32,
    /// Most recent failure description
    pub last_error: Option<String>,
    /// The event must not be reattempted before this instant
    pub next_retry_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Set on successful delivery
    pub synced_at: Option<DateTime<Utc>>,
    /// Soft-delete marker, set together with `synced_at`
    pub deleted_at: Option<DateTime<Utc>>,
}

impl OutboxEvent {
    /// Build a fresh `pending` event, immediately eligible for delivery.
    pub fn new(new: NewEvent, max_attempts: i32, now: DateTime<Utc>) -> Self {
        Self {
            id: new.id,
            tenant_id: new.tenant_id,
            location_id: new.location_id,
            event_type: new.event_type,
            body: new.body,
            status: EventStatus::Pending,
            attempts: 0,
            max_attempts,
            last_error: None,
            next_retry_at: now,
            created_at: now,
            synced_at: None,
            deleted_at: None,
        }
    }

    /// Whether the attempt budget is used up.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Mark a delivery attempt as in flight.
    pub fn mark_processing(&mut self) {
        self.status = EventStatus::Processing;
    }

    /// Mark delivered: completed, synced, and soft-deleted.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.status = EventStatus::Completed;
        self.synced_at = Some(now);
        self.deleted_at = Some(now);
    }

    /// Record a failed attempt and schedule the retry.
    pub fn mark_failed(&mut self, error: impl Into<String>, next_retry_at: DateTime<Utc>) {
        self.status = EventStatus::Failed;
        self.attempts += 1;
        self.last_error = Some(error.into());
        self.next_retry_at = next_retry_at;
    }

    /// Move to dead letter, keeping the last known error for diagnostics.
    pub fn mark_dead_letter(&mut self) {
        self.status = EventStatus::DeadLetter;
        if self.last_error.is_none() {
            self.last_error = Some("max delivery attempts exceeded".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> OutboxEvent {
        let new = NewEvent {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            event_type: "order.created".to_string(),
            body: json!({"total_cents": 1250}),
        };
        OutboxEvent::new(new, 5, Utc::now())
    }

    #[test]
    fn test_new_event_is_immediately_due() {
        let event = sample();
        assert_eq!(event.status, EventStatus::Pending);
        assert_eq!(event.attempts, 0);
        assert_eq!(event.next_retry_at, event.created_at);
        assert!(event.synced_at.is_none());
        assert!(event.deleted_at.is_none());
    }

    #[test]
    fn test_success_path() {
        let mut event = sample();
        event.mark_processing();
        assert_eq!(event.status, EventStatus::Processing);

        let now = Utc::now();
        event.mark_completed(now);
        assert_eq!(event.status, EventStatus::Completed);
        assert_eq!(event.synced_at, Some(now));
        assert_eq!(event.deleted_at, Some(now));
        assert_eq!(event.attempts, 0);
    }

    #[test]
    fn test_failure_increments_attempts() {
        let mut event = sample();
        let retry_at = Utc::now() + chrono::Duration::seconds(2);
        event.mark_failed("HTTP 500", retry_at);
        assert_eq!(event.status, EventStatus::Failed);
        assert_eq!(event.attempts, 1);
        assert_eq!(event.last_error.as_deref(), Some("HTTP 500"));
        assert_eq!(event.next_retry_at, retry_at);
    }

    #[test]
    fn test_dead_letter_keeps_last_error() {
        let mut event = sample();
        event.mark_failed("HTTP 503", Utc::now());
        event.mark_dead_letter();
        assert_eq!(event.status, EventStatus::DeadLetter);
        assert_eq!(event.last_error.as_deref(), Some("HTTP 503"));
    }

    #[test]
    fn test_dead_letter_default_message() {
        let mut event = sample();
        event.mark_dead_letter();
        assert_eq!(
            event.last_error.as_deref(),
            Some("max delivery attempts exceeded")
        );
    }

    #[test]
    fn test_exhaustion() {
        let mut event = sample();
        assert!(!event.is_exhausted());
        for _ in 0..5 {
            event.mark_failed("boom", Utc::now());
        }
        assert_eq!(event.attempts, 5);
        assert!(event.is_exhausted());
    }

    #[test]
    fn test_status_predicates() {
        assert!(EventStatus::Completed.is_terminal());
        assert!(EventStatus::DeadLetter.is_terminal());
        assert!(!EventStatus::Processing.is_terminal());

        assert!(EventStatus::Pending.is_due());
        assert!(EventStatus::Failed.is_due());
        assert!(!EventStatus::Processing.is_due());
        assert!(!EventStatus::Completed.is_due());
        assert!(!EventStatus::DeadLetter.is_due());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            EventStatus::Pending,
            EventStatus::Processing,
            EventStatus::Completed,
            EventStatus::Failed,
            EventStatus::DeadLetter,
        ] {
            assert_eq!(status.as_str().parse::<EventStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<EventStatus>().is_err());
    }
}
