//! Idempotency middleware.
//!
//! Requests without the `Idempotency-Key` header pass through unguarded.
//! Guarded requests are resolved against the store before the handler runs:
//! a processed key short-circuits with the cached response (or `409` under
//! the conflict-response policy); an unseen key lets the handler run, then
//! records its buffered result under the composite key. Losing the insert
//! race to a concurrent request is resolved by policy, never surfaced as an
//! error.
//!
//! Store unavailability during lookup is governed by the configured failure
//! mode: fail open (proceed unguarded) or fail closed (`503`). A persist
//! failure after the handler already ran is always logged and the real
//! response returned; discarding completed work would punish the client for
//! a cache problem.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use savekit_idempotency::{
    CachedResponse, ConflictHandling, FailureMode, IdempotencyConfig, IdempotencyError,
    IdempotencyKey, IdempotencyKeyRecord, IdempotencyStore, MarkOutcome,
};

/// Request header carrying the client-supplied idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Shared state for [`idempotency_middleware`].
#[derive(Clone)]
pub struct IdempotencyState {
    pub store: Arc<dyn IdempotencyStore>,
    pub config: Arc<IdempotencyConfig>,
}

impl IdempotencyState {
    pub fn new(store: Arc<dyn IdempotencyStore>, config: IdempotencyConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

pub async fn idempotency_middleware(
    State(state): State<IdempotencyState>,
    req: axum::http::Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(raw_key) = extract_key(req.headers()) else {
        return Ok(next.run(req).await);
    };

    // Validation happens before any handler logic or store access.
    let key = IdempotencyKey::new(
        &raw_key,
        req.uri().path(),
        req.method().as_str(),
        state.config.max_key_length,
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "rejected malformed idempotency key");
        StatusCode::UNPROCESSABLE_ENTITY
    })?;

    let composite = key.composite();
    match state.store.is_key_processed(&composite).await {
        Ok(Some(cached)) => {
            return Ok(match state.config.conflict_handling {
                ConflictHandling::ReturnCachedResult => cached_into_response(&cached),
                ConflictHandling::ConflictResponse => StatusCode::CONFLICT.into_response(),
            });
        }
        Ok(None) => {}
        Err(IdempotencyError::Unavailable(msg)) => match state.config.failure_mode {
            FailureMode::FailOpen => {
                tracing::warn!(%msg, "idempotency store unavailable; proceeding unguarded");
                return Ok(next.run(req).await);
            }
            FailureMode::FailClosed => return Err(StatusCode::SERVICE_UNAVAILABLE),
        },
        Err(IdempotencyError::Validation(_)) => return Err(StatusCode::UNPROCESSABLE_ENTITY),
    }

    let response = next.run(req).await;
    record_response(&state, &key, response).await
}

fn extract_key(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(IDEMPOTENCY_KEY_HEADER)?;
    let value = value.to_str().ok()?.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.to_string())
}

/// Buffer the handler's response, persist it when cacheable, and resolve a
/// lost insert race according to the conflict policy.
async fn record_response(
    state: &IdempotencyState,
    key: &IdempotencyKey,
    response: Response,
) -> Result<Response, StatusCode> {
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let cacheable = (parts.status.is_success() || state.config.cache_error_responses)
        && bytes.len() <= state.config.max_body_bytes;

    if !cacheable {
        return Ok(Response::from_parts(parts, Body::from(bytes)));
    }

    // Non-UTF-8 bodies are silently not cached, like oversized ones.
    let body_text = match std::str::from_utf8(&bytes) {
        Ok(text) if !text.is_empty() => Some(text.to_string()),
        Ok(_) => None,
        Err(_) => return Ok(Response::from_parts(parts, Body::from(bytes))),
    };

    let now = Utc::now();
    let cached = CachedResponse {
        status_code: parts.status.as_u16(),
        body: body_text,
        content_type: parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string()),
        created_at: now,
        expires_at: now + state.config.expiration,
    };

    let record = match IdempotencyKeyRecord::new(key, &cached) {
        Ok(record) => record,
        Err(e) => {
            tracing::debug!(error = %e, "response not cacheable; returning it uncached");
            return Ok(Response::from_parts(parts, Body::from(bytes)));
        }
    };

    match state.store.mark_key_processed(record).await {
        Ok(MarkOutcome::Recorded) => Ok(Response::from_parts(parts, Body::from(bytes))),
        Ok(MarkOutcome::AlreadyRecorded) => {
            // A concurrent request won the insert race; its payload is the
            // canonical result for this key.
            match state.config.conflict_handling {
                ConflictHandling::ConflictResponse => Err(StatusCode::CONFLICT),
                ConflictHandling::ReturnCachedResult => {
                    match state.store.is_key_processed(&key.composite()).await {
                        Ok(Some(winner)) => Ok(cached_into_response(&winner)),
                        // Expired or unreadable: fall back to our own result.
                        _ => Ok(Response::from_parts(parts, Body::from(bytes))),
                    }
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to record idempotency key");
            Ok(Response::from_parts(parts, Body::from(bytes)))
        }
    }
}

fn cached_into_response(cached: &CachedResponse) -> Response {
    let status =
        StatusCode::from_u16(cached.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut headers = HeaderMap::new();
    if let Some(content_type) = &cached.content_type {
        if let Ok(value) = HeaderValue::from_str(content_type) {
            headers.insert(header::CONTENT_TYPE, value);
        }
    }

    let body = cached.body.clone().unwrap_or_default();
    (status, headers, body).into_response()
}
