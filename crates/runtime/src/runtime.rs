//! The container runtime boundary.
//!
//! Hivewatch never creates or removes honeypot containers. It only lists the
//! instances that carry a target label and reads their log output.

use std::collections::HashMap;
use std::future::Future;

use crate::error::RuntimeError;

/// Validates an instance reference before it is handed to the runtime API.
///
/// Docker container IDs are 64-character hex strings (or shorter prefix forms).
pub fn validate_instance_ref(id: &str) -> Result<(), RuntimeError> {
    if id.is_empty() || id.len() > 64 || !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RuntimeError::InvalidInstanceRef(id.to_owned()));
    }
    Ok(())
}

/// A runtime instance as seen by hivewatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    /// Runtime-assigned instance id (container id).
    pub id: String,
    /// Instance name without the leading `/`.
    pub name: String,
    /// All labels attached to the instance.
    pub labels: HashMap<String, String>,
    /// Whether the instance is currently running.
    pub running: bool,
}

impl InstanceInfo {
    pub fn new(id: impl Into<String>, running: bool) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            labels: HashMap::new(),
            running,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Returns the value of `key`, if the label is present.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Read-only access to the container runtime.
///
/// # Implementations
///
/// - [`BollardRuntime`](crate::BollardRuntime): Docker via `bollard`
/// - `MockRuntime`: in-memory runtime for tests (`mock` feature)
///
/// # Error Handling
///
/// - a missing instance yields [`RuntimeError::NotFound`]
/// - an unreachable daemon yields [`RuntimeError::Connection`]
pub trait ContainerRuntime: Send + Sync + 'static {
    /// Returns the last `tail_lines` lines of combined stdout/stderr output.
    fn get_logs(
        &self,
        instance_ref: &str,
        tail_lines: usize,
    ) -> impl Future<Output = Result<String, RuntimeError>> + Send;

    /// Lists every instance (running or not) that carries `label`.
    fn list_labeled_instances(
        &self,
        label: &str,
    ) -> impl Future<Output = Result<Vec<InstanceInfo>, RuntimeError>> + Send;

    /// Checks runtime connectivity.
    fn ping(&self) -> impl Future<Output = Result<(), RuntimeError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_full_and_short_hex_ids() {
        validate_instance_ref("abc123def456").unwrap();
        validate_instance_ref(&"a".repeat(64)).unwrap();
    }

    #[test]
    fn rejects_empty_long_and_non_hex_ids() {
        assert!(validate_instance_ref("").is_err());
        assert!(validate_instance_ref(&"a".repeat(65)).is_err());
        assert!(validate_instance_ref("abc;rm -rf").is_err());
        assert!(matches!(
            validate_instance_ref("cowrie-1"),
            Err(RuntimeError::InvalidInstanceRef(_))
        ));
    }

    #[test]
    fn instance_label_lookup() {
        let info = InstanceInfo::new("abc123", true).with_label("honeypot.id", "hp-1");
        assert_eq!(info.label("honeypot.id"), Some("hp-1"));
        assert_eq!(info.label("honeypot.type"), None);
        assert_eq!(info.name, "abc123");
    }
}
