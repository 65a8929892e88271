//! Database layer backed by PostgreSQL via sqlx.
//!
//! [`Database`] owns the connection pool and implements [`EventStore`] over
//! the `outbox_events` table. Status is stored as text and parsed back
//! through [`EventStatus`]'s `FromStr`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::{RelayError, Result};
use crate::outbox::{EventStatus, EventStore, OutboxEvent};

/// Database connection and outbox persistence.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new connection pool.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Run migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RelayError::from(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EventStore for Database {
    async fn create(&self, event: &OutboxEvent) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO outbox_events
                (id, tenant_id, location_id, event_type, body, status, attempts,
                 max_attempts, last_error, next_retry_at, created_at, synced_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(event.id)
        .bind(event.tenant_id)
        .bind(event.location_id)
        .bind(&event.event_type)
        .bind(&event.body)
        .bind(event.status.as_str())
        .bind(event.attempts)
        .bind(event.max_attempts)
        .bind(&event.last_error)
        .bind(event.next_retry_at)
        .bind(event.created_at)
        .bind(event.synced_at)
        .bind(event.deleted_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RelayError::DuplicateEvent(event.id));
        }
        Ok(())
    }

    async fn count_active(&self, location_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM outbox_events WHERE location_id = $1 AND deleted_at IS NULL",
        )
        .bind(location_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn find_oldest(&self, location_id: Uuid, limit: i64) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM outbox_events
            WHERE location_id = $1 AND deleted_at IS NULL
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(location_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn delete_many(&self, location_id: Uuid, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            "DELETE FROM outbox_events WHERE location_id = $1 AND id = ANY($2)",
        )
        .bind(location_id)
        .bind(ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<OutboxEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, tenant_id, location_id, event_type, body, status, attempts,
                   max_attempts, last_error, next_retry_at, created_at, synced_at, deleted_at
            FROM outbox_events
            WHERE status IN ('pending', 'failed')
              AND next_retry_at <= $1
              AND deleted_at IS NULL
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OutboxEvent::try_from).collect()
    }

    async fn update(&self, event: &OutboxEvent) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = $2,
                attempts = $3,
                last_error = $4,
                next_retry_at = $5,
                synced_at = $6,
                deleted_at = $7
            WHERE id = $1
            "#,
        )
        .bind(event.id)
        .bind(event.status.as_str())
        .bind(event.attempts)
        .bind(&event.last_error)
        .bind(event.next_retry_at)
        .bind(event.synced_at)
        .bind(event.deleted_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RelayError::EventNotFound(event.id));
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    tenant_id: Uuid,
    location_id: Uuid,
    event_type: String,
    body: serde_json::Value,
    status: String,
    attempts: i32,
    max_attempts: i32,
    last_error: Option<String>,
    next_retry_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    synced_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<EventRow> for OutboxEvent {
    type Error = RelayError;

    fn try_from(row: EventRow) -> Result<Self> {
        let status: EventStatus = row.status.parse()?;
        Ok(OutboxEvent {
            id: row.id,
            tenant_id: row.tenant_id,
            location_id: row.location_id,
            event_type: row.event_type,
            body: row.body,
            status,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
            last_error: row.last_error,
            next_retry_at: row.next_retry_at,
            created_at: row.created_at,
            synced_at: row.synced_at,
            deleted_at: row.deleted_at,
        })
    }
}
