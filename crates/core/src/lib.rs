//! `savekit-core` — domain foundation for the save pipeline.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the tracked-entity state model, the boundary contracts for the object
//! tracker that owns entity lifetimes, and the pre-write snapshot taken at the
//! start of every unit-of-work.

pub mod snapshot;
pub mod state;
pub mod tracking;

pub use snapshot::{SaveSnapshot, SnapshotEntry, SnapshotError};
pub use state::EntityState;
pub use tracking::{
    EntityKey, EventSource, InMemoryTrackingContext, TrackedObject, TrackingContext, TrackingError,
};
