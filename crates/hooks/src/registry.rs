//! Hook registration.
//!
//! Registration order is execution order. Registration is idempotent per
//! phase: the name set is the source of truth, so registering the same name
//! twice is a no-op rather than a process-wide "already configured" flag.

use std::collections::HashSet;
use std::sync::Arc;

use crate::hook::{AfterSaveHook, BeforeSaveHook};

/// Ordered, name-deduplicated hook collection for one unit-of-work type.
#[derive(Default)]
pub struct HookRegistry {
    before: Vec<Arc<dyn BeforeSaveHook>>,
    before_names: HashSet<String>,
    after: Vec<Arc<dyn AfterSaveHook>>,
    after_names: HashSet<String>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a before-hook. Returns false (and keeps the existing hook) if
    /// the name is already registered for this phase.
    pub fn register_before(&mut self, hook: Arc<dyn BeforeSaveHook>) -> bool {
        let name = hook.name().to_string();
        if !self.before_names.insert(name.clone()) {
            tracing::debug!(hook = %name, "before-hook already registered; skipping");
            return false;
        }
        self.before.push(hook);
        true
    }

    /// Register an after-hook. Returns false (and keeps the existing hook) if
    /// the name is already registered for this phase.
    pub fn register_after(&mut self, hook: Arc<dyn AfterSaveHook>) -> bool {
        let name = hook.name().to_string();
        if !self.after_names.insert(name.clone()) {
            tracing::debug!(hook = %name, "after-hook already registered; skipping");
            return false;
        }
        self.after.push(hook);
        true
    }

    /// Before-hooks in registration order.
    pub fn before_hooks(&self) -> &[Arc<dyn BeforeSaveHook>] {
        &self.before
    }

    /// After-hooks in registration order.
    pub fn after_hooks(&self) -> &[Arc<dyn AfterSaveHook>] {
        &self.after
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }
}

impl core::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish()
    }
}
