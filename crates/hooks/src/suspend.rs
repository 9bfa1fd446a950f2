//! Scoped hook suspension.
//!
//! Bulk operations (migrations, seeding) can suspend hook execution for a
//! scope. The switch is a nesting counter: every guard increments it on
//! acquisition and decrements it on drop, so release is guaranteed on all
//! exit paths and nested scopes compose. Hooks run only while the counter is
//! zero.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Nesting-aware switch that disables hook execution while held.
#[derive(Debug, Default)]
pub struct HookSuspension {
    depth: AtomicUsize,
}

impl HookSuspension {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while at least one guard is alive.
    pub fn is_suspended(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }

    /// Acquire a suspension scope. Dropping the guard restores the prior
    /// state.
    pub fn suspend(self: &Arc<Self>) -> SuspensionGuard {
        self.depth.fetch_add(1, Ordering::SeqCst);
        SuspensionGuard {
            suspension: Arc::clone(self),
        }
    }
}

/// Scope token returned by [`HookSuspension::suspend`].
#[derive(Debug)]
pub struct SuspensionGuard {
    suspension: Arc<HookSuspension>,
}

impl Drop for SuspensionGuard {
    fn drop(&mut self) {
        self.suspension.depth.fetch_sub(1, Ordering::SeqCst);
    }
}
