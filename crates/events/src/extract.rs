//! Post-save event extraction.
//!
//! Extraction walks the snapshot's entries and, for each entity that exposed
//! the event-source capability at capture time, drains its queued events.
//! Draining is destructive: the entity's queue is emptied and cannot be
//! re-read for the same unit-of-work. The returned sequence is lazy, finite
//! and single-pass: a second extraction over the same snapshot yields
//! nothing new because the queues are already empty.

use serde_json::Value as JsonValue;

use savekit_core::{SaveSnapshot, SnapshotEntry, SnapshotError, TrackedObject};
use std::sync::Arc;

use crate::event_object::EventObject;

/// Maps additional projected event payloads for an entity, beyond the events
/// the entity queued itself.
pub trait EventMapper: Send + Sync {
    fn map(&self, entity: &dyn TrackedObject) -> Vec<JsonValue>;
}

/// Drain events from every event-carrying snapshot entry.
///
/// Entities without the capability, and entities whose drain produces no
/// events, yield no [`EventObject`].
pub fn extract_events<'a>(
    snapshot: &SaveSnapshot,
    mapper: Option<&'a dyn EventMapper>,
) -> Result<ExtractedEvents<'a>, SnapshotError> {
    Ok(ExtractedEvents {
        entries: snapshot.entries()?,
        index: 0,
        mapper,
    })
}

/// Lazy iterator over the event objects of one snapshot.
pub struct ExtractedEvents<'a> {
    entries: Arc<[SnapshotEntry]>,
    index: usize,
    mapper: Option<&'a dyn EventMapper>,
}

impl Iterator for ExtractedEvents<'_> {
    type Item = EventObject;

    fn next(&mut self) -> Option<EventObject> {
        while self.index < self.entries.len() {
            let entry = &self.entries[self.index];
            self.index += 1;

            // Capability was checked once at capture time.
            if !entry.carries_events() {
                continue;
            }

            let entity = entry.entity();
            let mut events = entity
                .as_event_source()
                .map(|source| source.take_events())
                .unwrap_or_default();
            if let Some(mapper) = self.mapper {
                events.extend(mapper.map(entity.as_ref()));
            }

            if events.is_empty() {
                continue;
            }

            tracing::trace!(
                entity_type_name = entity.entity_type_name(),
                event_count = events.len(),
                "drained entity events"
            );

            return Some(EventObject::new(
                entity.entity_type_name(),
                entity.entity_key(),
                events,
            ));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use savekit_core::{EntityKey, EntityState, EventSource, InMemoryTrackingContext};
    use serde_json::json;
    use std::sync::Mutex;

    struct Emitting {
        name: String,
        queue: Mutex<Vec<JsonValue>>,
    }

    impl Emitting {
        fn new(name: &str, events: Vec<JsonValue>) -> Self {
            Self {
                name: name.to_string(),
                queue: Mutex::new(events),
            }
        }
    }

    impl TrackedObject for Emitting {
        fn entity_type_name(&self) -> &str {
            &self.name
        }

        fn entity_key(&self) -> EntityKey {
            EntityKey::new().with("Id", json!(self.name))
        }

        fn as_event_source(&self) -> Option<&dyn EventSource> {
            Some(self)
        }
    }

    impl EventSource for Emitting {
        fn take_events(&self) -> Vec<JsonValue> {
            let mut queue = self.queue.lock().unwrap();
            std::mem::take(&mut *queue)
        }
    }

    struct Silent;

    impl TrackedObject for Silent {
        fn entity_type_name(&self) -> &str {
            "test.silent"
        }

        fn entity_key(&self) -> EntityKey {
            EntityKey::new().with("Id", json!(0))
        }
    }

    fn snapshot_of(ctx: Arc<InMemoryTrackingContext>) -> SaveSnapshot {
        SaveSnapshot::capture(ctx).unwrap()
    }

    #[test]
    fn drains_only_event_carrying_entities() {
        let ctx = Arc::new(InMemoryTrackingContext::new());
        ctx.track(
            Arc::new(Emitting::new("test.order", vec![json!({"kind": "created"})])),
            EntityState::Added,
        );
        ctx.track(Arc::new(Silent), EntityState::Modified);

        let snapshot = snapshot_of(ctx);
        let objects: Vec<EventObject> = extract_events(&snapshot, None).unwrap().collect();

        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].entity_type_name(), "test.order");
        assert_eq!(objects[0].events(), &[json!({"kind": "created"})]);
    }

    #[test]
    fn draining_is_destructive() {
        let ctx = Arc::new(InMemoryTrackingContext::new());
        ctx.track(
            Arc::new(Emitting::new("test.order", vec![json!(1), json!(2)])),
            EntityState::Added,
        );

        let snapshot = snapshot_of(ctx);
        let first: Vec<EventObject> = extract_events(&snapshot, None).unwrap().collect();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].events().len(), 2);

        // Queues are empty now; a second pass yields nothing.
        let second: Vec<EventObject> = extract_events(&snapshot, None).unwrap().collect();
        assert!(second.is_empty());
    }

    #[test]
    fn extraction_is_lazy() {
        let ctx = Arc::new(InMemoryTrackingContext::new());
        ctx.track(
            Arc::new(Emitting::new("test.a", vec![json!("a")])),
            EntityState::Added,
        );
        ctx.track(
            Arc::new(Emitting::new("test.b", vec![json!("b")])),
            EntityState::Added,
        );

        let snapshot = snapshot_of(ctx);
        let mut iter = extract_events(&snapshot, None).unwrap();

        // Only the first entity is drained so far.
        let first = iter.next().unwrap();
        assert_eq!(first.entity_type_name(), "test.a");

        let entries = snapshot.entries().unwrap();
        let second_entity = entries[1].entity();
        let remaining = second_entity.as_event_source().unwrap().take_events();
        assert_eq!(remaining, vec![json!("b")]);

        // The iterator observes the drain we just did.
        assert!(iter.next().is_none());
    }

    #[test]
    fn mapper_adds_projected_events() {
        struct Projector;

        impl EventMapper for Projector {
            fn map(&self, entity: &dyn TrackedObject) -> Vec<JsonValue> {
                vec![json!({"projected_for": entity.entity_type_name()})]
            }
        }

        let ctx = Arc::new(InMemoryTrackingContext::new());
        ctx.track(
            Arc::new(Emitting::new("test.order", vec![json!("own")])),
            EntityState::Added,
        );

        let snapshot = snapshot_of(ctx);
        let objects: Vec<EventObject> =
            extract_events(&snapshot, Some(&Projector)).unwrap().collect();

        assert_eq!(objects.len(), 1);
        assert_eq!(
            objects[0].events(),
            &[json!("own"), json!({"projected_for": "test.order"})]
        );
    }
}
