//! In-memory idempotency store for tests/dev.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::key::CompositeKey;
use crate::record::IdempotencyKeyRecord;
use crate::response::CachedResponse;
use crate::store::{IdempotencyError, IdempotencyStore, MarkOutcome};

/// Map-backed store. Not optimized for performance.
///
/// Entry occupancy models the unique index: the first insert for a composite
/// key wins, later inserts observe the occupied entry, which is the same
/// semantics the Postgres unique constraint provides.
#[derive(Debug, Default)]
pub struct InMemoryIdempotencyStore {
    records: RwLock<HashMap<String, IdempotencyKeyRecord>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows (including expired ones).
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw row access for assertions.
    pub fn record(&self, key: &CompositeKey) -> Option<IdempotencyKeyRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key.as_str())
            .cloned()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn is_key_processed(
        &self,
        key: &CompositeKey,
    ) -> Result<Option<CachedResponse>, IdempotencyError> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let response = records
            .get(key.as_str())
            .map(|record| record.to_response())
            .filter(|response| !response.is_expired(Utc::now()));
        Ok(response)
    }

    async fn mark_key_processed(
        &self,
        record: IdempotencyKeyRecord,
    ) -> Result<MarkOutcome, IdempotencyError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        match records.entry(record.composite_key.clone()) {
            Entry::Occupied(_) => {
                tracing::info!(
                    composite_key = %record.composite_key,
                    "composite key already recorded; keeping first response"
                );
                Ok(MarkOutcome::AlreadyRecorded)
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(MarkOutcome::Recorded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{IdempotencyKey, MAX_KEY_LENGTH};
    use chrono::Duration;
    use std::sync::Arc;

    fn key(raw: &str) -> IdempotencyKey {
        IdempotencyKey::new(raw, "/orders", "POST", MAX_KEY_LENGTH).unwrap()
    }

    fn response(status: u16, body: &str) -> CachedResponse {
        let now = Utc::now();
        CachedResponse {
            status_code: status,
            body: Some(body.to_string()),
            content_type: Some("application/json".to_string()),
            created_at: now,
            expires_at: now + Duration::hours(24),
        }
    }

    fn record(key: &IdempotencyKey, status: u16, body: &str) -> IdempotencyKeyRecord {
        IdempotencyKeyRecord::new(key, &response(status, body)).unwrap()
    }

    #[tokio::test]
    async fn unseen_key_then_processed_key() {
        let store = InMemoryIdempotencyStore::new();
        let key = key("abc123");
        let composite = key.composite();

        assert_eq!(store.is_key_processed(&composite).await.unwrap(), None);

        let outcome = store
            .mark_key_processed(record(&key, 201, r#"{"id":1}"#))
            .await
            .unwrap();
        assert_eq!(outcome, MarkOutcome::Recorded);

        let cached = store.is_key_processed(&composite).await.unwrap().unwrap();
        assert_eq!(cached.status_code, 201);
        assert_eq!(cached.body.as_deref(), Some(r#"{"id":1}"#));
    }

    #[tokio::test]
    async fn second_mark_keeps_the_first_response() {
        let store = InMemoryIdempotencyStore::new();
        let key = key("abc123");
        let composite = key.composite();

        assert_eq!(
            store
                .mark_key_processed(record(&key, 201, "first"))
                .await
                .unwrap(),
            MarkOutcome::Recorded
        );
        assert_eq!(
            store
                .mark_key_processed(record(&key, 200, "second"))
                .await
                .unwrap(),
            MarkOutcome::AlreadyRecorded
        );

        assert_eq!(store.len(), 1);
        let cached = store.is_key_processed(&composite).await.unwrap().unwrap();
        assert_eq!(cached.status_code, 201);
        assert_eq!(cached.body.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn concurrent_marks_leave_exactly_one_row() {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        let key = key("race-key");

        let mut tasks = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            let record = record(&key, 201, &format!("caller-{i}"));
            tasks.push(tokio::spawn(async move {
                store.mark_key_processed(record).await
            }));
        }

        let mut recorded = 0;
        let mut already = 0;
        for task in tasks {
            match task.await.unwrap().unwrap() {
                MarkOutcome::Recorded => recorded += 1,
                MarkOutcome::AlreadyRecorded => already += 1,
            }
        }

        assert_eq!(recorded, 1);
        assert_eq!(already, 7);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn expired_row_reads_as_absent() {
        let store = InMemoryIdempotencyStore::new();
        let key = key("stale");
        let composite = key.composite();

        let now = Utc::now();
        let expired = CachedResponse {
            status_code: 200,
            body: None,
            content_type: None,
            created_at: now - Duration::hours(48),
            expires_at: now - Duration::hours(24),
        };
        store
            .mark_key_processed(IdempotencyKeyRecord::new(&key, &expired).unwrap())
            .await
            .unwrap();

        // The row physically exists but is reported as absent.
        assert_eq!(store.len(), 1);
        assert_eq!(store.is_key_processed(&composite).await.unwrap(), None);
    }
}
