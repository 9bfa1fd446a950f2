//! Hook execution.
//!
//! Each phase runs its hooks sequentially, in registration order, awaiting
//! one before starting the next (later hooks may depend on earlier hooks'
//! side effects on the same snapshot). Execution is fail-fast: the first
//! error aborts the remaining hooks of the phase and propagates.

use std::sync::Arc;

use savekit_core::SaveSnapshot;

use crate::error::HookError;
use crate::hook::{AfterSaveHook, BeforeSaveHook};
use crate::suspend::HookSuspension;

/// Runs a phase's hooks against one snapshot.
#[derive(Debug)]
pub struct HookRunner {
    suspension: Arc<HookSuspension>,
}

impl HookRunner {
    pub fn new() -> Self {
        Self {
            suspension: Arc::new(HookSuspension::new()),
        }
    }

    /// Share an existing suspension switch (e.g. one per unit-of-work type).
    pub fn with_suspension(suspension: Arc<HookSuspension>) -> Self {
        Self { suspension }
    }

    /// The suspension switch governing this runner.
    pub fn suspension(&self) -> Arc<HookSuspension> {
        Arc::clone(&self.suspension)
    }

    /// Run every before-hook once, in order. No-op while suspended.
    pub async fn run_before(
        &self,
        snapshot: &SaveSnapshot,
        hooks: &[Arc<dyn BeforeSaveHook>],
    ) -> Result<(), HookError> {
        if self.suspension.is_suspended() {
            tracing::debug!(phase = "before", "hooks suspended; skipping phase");
            return Ok(());
        }

        for hook in hooks {
            tracing::trace!(hook = hook.name(), phase = "before", "running hook");
            hook.before_save(snapshot)
                .await
                .map_err(|e| HookError::new(hook.name(), e))?;
        }

        Ok(())
    }

    /// Run every after-hook once, in order. No-op while suspended.
    pub async fn run_after(
        &self,
        snapshot: &SaveSnapshot,
        hooks: &[Arc<dyn AfterSaveHook>],
    ) -> Result<(), HookError> {
        if self.suspension.is_suspended() {
            tracing::debug!(phase = "after", "hooks suspended; skipping phase");
            return Ok(());
        }

        for hook in hooks {
            tracing::trace!(hook = hook.name(), phase = "after", "running hook");
            hook.after_save(snapshot)
                .await
                .map_err(|e| HookError::new(hook.name(), e))?;
        }

        Ok(())
    }
}

impl Default for HookRunner {
    fn default() -> Self {
        Self::new()
    }
}
