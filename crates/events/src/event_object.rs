use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use savekit_core::EntityKey;

/// Events emitted by one entity during a unit-of-work, grouped with the
/// entity's identity.
///
/// Produced after a successful write by [`extract_events`](crate::extract_events).
/// The payloads are opaque to this crate; consumers deserialize them against
/// their own event schemas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventObject {
    entity_type_name: String,
    entity_key: EntityKey,
    events: Vec<JsonValue>,
}

impl EventObject {
    pub fn new(
        entity_type_name: impl Into<String>,
        entity_key: EntityKey,
        events: Vec<JsonValue>,
    ) -> Self {
        Self {
            entity_type_name: entity_type_name.into(),
            entity_key,
            events,
        }
    }

    pub fn entity_type_name(&self) -> &str {
        &self.entity_type_name
    }

    pub fn entity_key(&self) -> &EntityKey {
        &self.entity_key
    }

    /// Emitted payloads, in the order the entity raised them.
    pub fn events(&self) -> &[JsonValue] {
        &self.events
    }

    pub fn into_events(self) -> Vec<JsonValue> {
        self.events
    }
}
