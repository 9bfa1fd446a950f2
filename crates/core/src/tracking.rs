//! Boundary contracts for the object tracker that owns entity lifetimes.
//!
//! The snapshot/hook engine does not track entities itself; it observes a
//! `TrackingContext` supplied by the caller. The contracts here are the
//! minimum the pipeline needs: enumerate what is tracked, read each object's
//! identity, and (when the entity supports it) drain its pending domain
//! events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::state::EntityState;

/// Ordered entity-key mapping (key-property name → value).
///
/// Iteration preserves declaration order; lookup by name is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityKey {
    parts: Vec<(String, JsonValue)>,
}

impl EntityKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key property (builder style).
    pub fn with(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.parts.push((name.into(), value));
        self
    }

    /// Case-insensitive lookup by property name.
    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.parts
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JsonValue)> {
        self.parts.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// A domain object owned by a tracking context.
///
/// The snapshot holds shared references to tracked objects; it never owns
/// their lifetime.
pub trait TrackedObject: Send + Sync {
    /// Stable type name (e.g. "orders.order").
    fn entity_type_name(&self) -> &str;

    /// The entity's key properties, in declaration order.
    fn entity_key(&self) -> EntityKey;

    /// Event-source capability, if the entity queues domain events.
    ///
    /// The result of this check is cached once per snapshot entry at capture
    /// time.
    fn as_event_source(&self) -> Option<&dyn EventSource> {
        None
    }
}

/// Capability of an entity to queue domain events until a save drains them.
pub trait EventSource: Send + Sync {
    /// Drain all pending events, in the order they were raised.
    ///
    /// Destructive: a second call returns an empty sequence until new events
    /// are raised.
    fn take_events(&self) -> Vec<JsonValue>;
}

/// Tracking context failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackingError {
    /// The tracking context was released before the call.
    #[error("tracking context has been disposed")]
    Disposed,
}

/// The object tracker a unit-of-work snapshots from.
pub trait TrackingContext: Send + Sync {
    /// Enumerate every currently-tracked object with its current state.
    ///
    /// Must not mutate any entity. Fails only if the context has already been
    /// released.
    fn tracked(&self) -> Result<Vec<(Arc<dyn TrackedObject>, EntityState)>, TrackingError>;
}

impl<C> TrackingContext for Arc<C>
where
    C: TrackingContext + ?Sized,
{
    fn tracked(&self) -> Result<Vec<(Arc<dyn TrackedObject>, EntityState)>, TrackingError> {
        (**self).tracked()
    }
}

/// In-memory tracking context for tests/dev.
#[derive(Default)]
pub struct InMemoryTrackingContext {
    entries: RwLock<Vec<(Arc<dyn TrackedObject>, EntityState)>>,
    disposed: AtomicBool,
}

impl InMemoryTrackingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an entity. Returns its index for later state changes.
    pub fn track(&self, entity: Arc<dyn TrackedObject>, state: EntityState) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.push((entity, state));
        entries.len() - 1
    }

    /// Change the live state of a tracked entity (simulates mutation between
    /// snapshot capture and hook execution).
    pub fn set_state(&self, index: usize, state: EntityState) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(index) {
            entry.1 = state;
        }
    }

    /// Release the context; subsequent `tracked()` calls fail.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }
}

impl core::fmt::Debug for InMemoryTrackingContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let len = self
            .entries
            .read()
            .map(|e| e.len())
            .unwrap_or_default();
        f.debug_struct("InMemoryTrackingContext")
            .field("tracked", &len)
            .field("disposed", &self.disposed.load(Ordering::SeqCst))
            .finish()
    }
}

impl TrackingContext for InMemoryTrackingContext {
    fn tracked(&self) -> Result<Vec<(Arc<dyn TrackedObject>, EntityState)>, TrackingError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(TrackingError::Disposed);
        }
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.clone())
    }
}
