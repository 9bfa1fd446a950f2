//! `savekit-events` — domain-event extraction and distribution.
//!
//! After a successful write, events queued on tracked entities are drained
//! from the pre-write snapshot into [`EventObject`]s and handed to an
//! [`EventBus`] for downstream consumers.

pub mod bus;
pub mod event_object;
pub mod extract;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use event_object::EventObject;
pub use extract::{EventMapper, ExtractedEvents, extract_events};
pub use in_memory_bus::InMemoryEventBus;
