//! # POS Relay
//!
//! Durable outbox for relaying locally-committed POS business events (orders,
//! payments, voids) to a remote backoffice/cloud system that may be
//! unreachable, slow, or temporarily rejecting requests.
//!
//! ## Architecture
//!
//! - **Event Publisher**: persists events as `pending` without ever failing the
//!   producing transaction, and enforces a per-location queue cap
//! - **Delivery Worker**: periodic drain of due events with HMAC-SHA256-signed
//!   HTTP delivery, exponential backoff, and dead-lettering
//! - **Sync Scheduler**: single cancellable background task per process
//! - **Event Store**: trait over the persistence contract, with Postgres and
//!   in-memory implementations
//! - **Telemetry**: structured logging and delivery metrics

pub mod config;
pub mod db;
pub mod error;
pub mod outbox;
pub mod signing;
pub mod telemetry;

pub use error::{ErrorCode, RelayError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, DatabaseConfig, ObservabilityConfig, SyncConfig};
    pub use crate::db::Database;
    pub use crate::error::{ErrorCode, RelayError, Result};
    pub use crate::outbox::{
        BackoffPolicy, Clock, DeliveryWorker, EventPublisher, EventStatus, EventStore,
        InMemoryEventStore, ManualClock, NewEvent, OutboxEvent, SyncScheduler, SystemClock,
    };
}
