use async_trait::async_trait;

use savekit_core::SaveSnapshot;

/// Callback invoked before the underlying write of a unit-of-work.
///
/// Hooks of the same phase run sequentially in registration order against the
/// same snapshot; a later hook may rely on an earlier hook's side effects.
/// Returning an error aborts the remaining phase **and the write**.
#[async_trait]
pub trait BeforeSaveHook: Send + Sync {
    /// Unique registration name (duplicate registrations are ignored).
    fn name(&self) -> &str;

    async fn before_save(&self, snapshot: &SaveSnapshot) -> anyhow::Result<()>;
}

/// Callback invoked after the underlying write succeeded.
///
/// Same ordering and fail-fast semantics as [`BeforeSaveHook`]; never runs
/// when the write failed.
#[async_trait]
pub trait AfterSaveHook: Send + Sync {
    /// Unique registration name (duplicate registrations are ignored).
    fn name(&self) -> &str;

    async fn after_save(&self, snapshot: &SaveSnapshot) -> anyhow::Result<()>;
}
