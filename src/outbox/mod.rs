//! Durable outbox for cloud-bound POS events.
//!
//! This module implements the at-least-once delivery pipeline:
//!
//! - **Publisher**: accepts events from the POS business layer, persists them
//!   as `pending`, and enforces the per-location queue cap
//! - **Delivery Worker**: drains due events in batches, POSTs signed payloads
//!   to the cloud ingestion endpoint, and applies retry/backoff/dead-letter
//!   transitions
//! - **Scheduler**: owns the single periodic background task per process
//!
//! ```text
//! business layer ──enqueue──▶ [outbox_events] ──find_due──▶ worker ──POST──▶ cloud
//!                                   ▲                         │
//!                                   └──── failed / backoff ───┘
//! ```
//!
//! Enqueue never raises toward the producer; every failure mode on the
//! delivery side is persisted state (`status` + `last_error`), not an
//! exception.

pub mod backoff;
pub mod clock;
pub mod delivery;
pub mod event;
pub mod publisher;
pub mod scheduler;
pub mod store;

pub use backoff::BackoffPolicy;
pub use clock::{Clock, ManualClock, SystemClock};
pub use delivery::DeliveryWorker;
pub use event::{EventStatus, NewEvent, OutboxEvent};
pub use publisher::EventPublisher;
pub use scheduler::SyncScheduler;
pub use store::{EventStore, InMemoryEventStore};

/// Maximum non-deleted events per location before the oldest are evicted.
pub const DEFAULT_QUEUE_CAP: i64 = 1000;

/// Events fetched per worker cycle.
pub const DEFAULT_BATCH_SIZE: i64 = 10;

/// Delivery attempts before an event is dead-lettered.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;
