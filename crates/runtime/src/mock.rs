//! In-memory runtime for tests.
//!
//! Compiled for this crate's tests and for other crates that enable the `mock`
//! feature in their `[dev-dependencies]`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::error::RuntimeError;
use crate::runtime::{ContainerRuntime, InstanceInfo};

/// Mock runtime with configurable instances, log buffers and failures.
///
/// State can be changed between calls, so a test can simulate an instance
/// disappearing mid-run.
#[derive(Default)]
pub struct MockRuntime {
    instances: Mutex<Vec<InstanceInfo>>,
    logs: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    unreachable: AtomicBool,
    log_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instance with the given log buffer.
    pub fn with_instance(self, info: InstanceInfo, logs: impl Into<String>) -> Self {
        self.add_instance(info, logs);
        self
    }

    pub fn add_instance(&self, info: InstanceInfo, logs: impl Into<String>) {
        lock(&self.logs).insert(info.id.clone(), logs.into());
        lock(&self.instances).push(info);
    }

    /// Removes an instance; later `get_logs` calls return `NotFound`.
    pub fn remove_instance(&self, id: &str) {
        lock(&self.instances).retain(|i| i.id != id);
        lock(&self.logs).remove(id);
    }

    /// Replaces the log buffer of an instance.
    pub fn set_logs(&self, id: &str, logs: impl Into<String>) {
        lock(&self.logs).insert(id.to_owned(), logs.into());
    }

    /// Makes `get_logs` for `id` fail with a transient API error.
    pub fn fail_logs_for(&self, id: &str) {
        lock(&self.failing).insert(id.to_owned());
    }

    /// Makes every call fail with a connection error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Number of `get_logs` calls so far.
    pub fn log_calls(&self) -> usize {
        self.log_calls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<(), RuntimeError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RuntimeError::Connection("mock runtime unreachable".to_owned()));
        }
        Ok(())
    }
}

impl ContainerRuntime for MockRuntime {
    async fn get_logs(&self, instance_ref: &str, tail_lines: usize) -> Result<String, RuntimeError> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        if lock(&self.failing).contains(instance_ref) {
            return Err(RuntimeError::Api(format!("mock failure for {instance_ref}")));
        }
        let logs = lock(&self.logs);
        let buffer = logs
            .get(instance_ref)
            .ok_or_else(|| RuntimeError::NotFound(instance_ref.to_owned()))?;

        let lines: Vec<&str> = buffer.lines().collect();
        let start = lines.len().saturating_sub(tail_lines);
        let mut out = lines[start..].join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        Ok(out)
    }

    async fn list_labeled_instances(&self, label: &str) -> Result<Vec<InstanceInfo>, RuntimeError> {
        self.check_reachable()?;
        Ok(lock(&self.instances)
            .iter()
            .filter(|i| i.labels.contains_key(label))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), RuntimeError> {
        self.check_reachable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn honeypot(id: &str, target: &str) -> InstanceInfo {
        InstanceInfo::new(id, true).with_label("honeypot.id", target)
    }

    #[tokio::test]
    async fn get_logs_respects_tail() {
        let runtime = MockRuntime::new().with_instance(honeypot("abc123", "hp-1"), "a\nb\nc\n");
        assert_eq!(runtime.get_logs("abc123", 2).await.unwrap(), "b\nc\n");
        assert_eq!(runtime.get_logs("abc123", 200).await.unwrap(), "a\nb\nc\n");
        assert_eq!(runtime.log_calls(), 2);
    }

    #[tokio::test]
    async fn removed_instance_is_not_found() {
        let runtime = MockRuntime::new().with_instance(honeypot("abc123", "hp-1"), "line\n");
        runtime.remove_instance("abc123");
        let err = runtime.get_logs("abc123", 10).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_filters_by_label() {
        let runtime = MockRuntime::new()
            .with_instance(honeypot("abc123", "hp-1"), "")
            .with_instance(InstanceInfo::new("def456", true), "");
        let listed = runtime.list_labeled_instances("honeypot.id").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "abc123");
    }

    #[tokio::test]
    async fn failing_instance_returns_api_error() {
        let runtime = MockRuntime::new().with_instance(honeypot("abc123", "hp-1"), "x\n");
        runtime.fail_logs_for("abc123");
        let err = runtime.get_logs("abc123", 10).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Api(_)));
    }

    #[tokio::test]
    async fn unreachable_runtime_fails_ping() {
        let runtime = MockRuntime::new();
        runtime.ping().await.unwrap();
        runtime.set_unreachable(true);
        assert!(matches!(
            runtime.ping().await,
            Err(RuntimeError::Connection(_))
        ));
    }

    #[test]
    fn mock_runtime_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<MockRuntime>();
    }
}
