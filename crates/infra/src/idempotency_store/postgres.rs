//! Postgres-backed idempotency store.
//!
//! The unique index on `composite_key` is the concurrency-safety mechanism:
//! concurrent inserts for the same key race at the database, exactly one
//! wins, and the losers' violations are caught here and reported as the
//! benign [`MarkOutcome::AlreadyRecorded`].
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | Result | Scenario |
//! |------------|----------------------|--------|----------|
//! | Database (unique violation) | `23505` | `Ok(AlreadyRecorded)` | Concurrent insert for the same composite key; expected and benign |
//! | Database (other) | Any other | `IdempotencyError::Unavailable` | Constraint/storage failures |
//! | PoolClosed / Io / other | N/A | `IdempotencyError::Unavailable` | Connection failures, timeouts |
//!
//! Only `23505` is treated as a race; nothing else is swallowed.
//!
//! ## Thread Safety
//!
//! `PostgresIdempotencyStore` is `Send + Sync` and can be shared across
//! tasks. All operations go through the SQLx connection pool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use savekit_idempotency::{
    CachedResponse, CompositeKey, IdempotencyError, IdempotencyKeyRecord, IdempotencyStore,
    MarkOutcome,
};

/// Postgres implementation of [`IdempotencyStore`].
#[derive(Debug, Clone)]
pub struct PostgresIdempotencyStore {
    pool: Arc<PgPool>,
}

impl PostgresIdempotencyStore {
    /// Create a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the `idempotency_keys` table and its indexes if absent.
    ///
    /// The unique index on `composite_key` is what makes the store's
    /// check-and-set protocol race-free; the `expires_at` index supports the
    /// external housekeeping job that deletes expired rows.
    pub async fn ensure_schema(&self) -> Result<(), IdempotencyError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS idempotency_keys (
                id UUID PRIMARY KEY,
                idempotent_key VARCHAR(150) NOT NULL,
                endpoint VARCHAR(250) NOT NULL,
                method VARCHAR(20) NOT NULL,
                composite_key VARCHAR(128) NOT NULL,
                status_code INTEGER NOT NULL CHECK (status_code BETWEEN 100 AND 599),
                body TEXT,
                content_type VARCHAR(256),
                created_at TIMESTAMPTZ NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                CONSTRAINT idempotency_keys_composite_key_key UNIQUE (composite_key)
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idempotency_keys_expires_at_idx \
             ON idempotency_keys (expires_at)",
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        Ok(())
    }
}

#[async_trait]
impl IdempotencyStore for PostgresIdempotencyStore {
    #[instrument(skip(self), fields(composite_key = %key), err)]
    async fn is_key_processed(
        &self,
        key: &CompositeKey,
    ) -> Result<Option<CachedResponse>, IdempotencyError> {
        let row = sqlx::query(
            r#"
            SELECT status_code, body, content_type, created_at, expires_at
            FROM idempotency_keys
            WHERE composite_key = $1
            LIMIT 1
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("is_key_processed", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let cached = CachedRow::from_row(&row)
            .map_err(|e| {
                IdempotencyError::unavailable(format!("failed to deserialize cached row: {e}"))
            })?
            .into_response();

        // Expired rows are treated as absent; deletion is a housekeeping job.
        if cached.is_expired(Utc::now()) {
            return Ok(None);
        }

        Ok(Some(cached))
    }

    #[instrument(
        skip(self, record),
        fields(
            composite_key = %record.composite_key,
            status_code = record.status_code
        ),
        err
    )]
    async fn mark_key_processed(
        &self,
        record: IdempotencyKeyRecord,
    ) -> Result<MarkOutcome, IdempotencyError> {
        let result = sqlx::query(
            r#"
            INSERT INTO idempotency_keys (
                id,
                idempotent_key,
                endpoint,
                method,
                composite_key,
                status_code,
                body,
                content_type,
                created_at,
                expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id)
        .bind(&record.idempotent_key)
        .bind(&record.endpoint)
        .bind(&record.method)
        .bind(&record.composite_key)
        .bind(i32::from(record.status_code))
        .bind(&record.body)
        .bind(&record.content_type)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&*self.pool)
        .await;

        match result {
            Ok(_) => Ok(MarkOutcome::Recorded),
            // The race resolution: another caller's insert committed first.
            // Its payload is the canonical cached value; this is not an error.
            Err(e) if is_unique_violation(&e) => {
                tracing::info!(
                    composite_key = %record.composite_key,
                    "composite key already recorded; concurrent insert won"
                );
                Ok(MarkOutcome::AlreadyRecorded)
            }
            Err(e) => Err(map_sqlx_error("mark_key_processed", e)),
        }
    }
}

/// Check if an error is a unique constraint violation (SQLSTATE 23505).
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

/// Map SQLx errors to IdempotencyError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> IdempotencyError {
    match err {
        sqlx::Error::Database(db_err) => IdempotencyError::unavailable(format!(
            "database error in {}: {}",
            operation,
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            IdempotencyError::unavailable(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::PoolTimedOut => {
            IdempotencyError::unavailable(format!("connection pool timed out in {operation}"))
        }
        _ => IdempotencyError::unavailable(format!("sqlx error in {operation}: {err}")),
    }
}

// SQLx row type

#[derive(Debug)]
struct CachedRow {
    status_code: i32,
    body: Option<String>,
    content_type: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for CachedRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(CachedRow {
            status_code: row.try_get("status_code")?,
            body: row.try_get("body")?,
            content_type: row.try_get("content_type")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

impl CachedRow {
    fn into_response(self) -> CachedResponse {
        CachedResponse {
            // The check constraint keeps the column inside 100..=599.
            status_code: self.status_code.clamp(100, 599) as u16,
            body: self.body,
            content_type: self.content_type,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}
