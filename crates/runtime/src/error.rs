//! Container runtime error types.
//!
//! [`RuntimeError`] converts into [`HivewatchError::Runtime`] so callers in the
//! daemon can propagate it with `?`.

use hivewatch_core::error::HivewatchError;

/// Errors returned by a [`ContainerRuntime`](crate::ContainerRuntime).
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The instance does not exist (anymore).
    #[error("instance not found: {0}")]
    NotFound(String),

    /// The runtime daemon could not be reached.
    #[error("runtime connection error: {0}")]
    Connection(String),

    /// Any other runtime API failure.
    #[error("runtime api error: {0}")]
    Api(String),

    /// The instance reference failed validation before any API call.
    #[error("invalid instance ref '{0}': must be 1-64 hex characters")]
    InvalidInstanceRef(String),
}

impl RuntimeError {
    /// Whether the backing instance is gone, as opposed to a transient failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<RuntimeError> for HivewatchError {
    fn from(err: RuntimeError) -> Self {
        HivewatchError::Runtime(err.to_string())
    }
}
