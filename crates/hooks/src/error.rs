use thiserror::Error;

/// A hook callback failed.
///
/// The failing hook's registration name is attached; the underlying error is
/// carried unmodified as the source so callers can downcast or walk the
/// chain.
#[derive(Debug, Error)]
#[error("hook '{hook}' failed: {source}")]
pub struct HookError {
    hook: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl HookError {
    pub fn new(hook: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            hook: hook.into(),
            source: source.into(),
        }
    }

    /// Registration name of the hook that failed.
    pub fn hook(&self) -> &str {
        &self.hook
    }
}
