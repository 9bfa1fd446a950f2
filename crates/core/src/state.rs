//! Tracked-entity state model.

use serde::{Deserialize, Serialize};

/// State of a tracked entity as reported by its tracking context.
///
/// A snapshot captures this once per entity; the captured value is immutable
/// even if the live entity's state changes afterwards.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    /// Tracked, no pending changes.
    Unchanged,
    /// Scheduled for insertion.
    Added,
    /// Scheduled for update.
    Modified,
    /// Scheduled for deletion.
    Deleted,
    /// Known to the tracker but no longer tracked.
    Detached,
}

impl EntityState {
    /// True if a write for an entity in this state would touch storage.
    pub fn is_pending_write(self) -> bool {
        matches!(
            self,
            EntityState::Added | EntityState::Modified | EntityState::Deleted
        )
    }
}

impl core::fmt::Display for EntityState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            EntityState::Unchanged => "unchanged",
            EntityState::Added => "added",
            EntityState::Modified => "modified",
            EntityState::Deleted => "deleted",
            EntityState::Detached => "detached",
        };
        f.write_str(name)
    }
}
