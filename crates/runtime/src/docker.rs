//! Docker implementation of [`ContainerRuntime`] using `bollard`.
//!
//! ```text
//!   Poller / recovery
//!          │
//!          ▼
//!  ┌──────────────────┐
//!  │ ContainerRuntime │ (trait)
//!  └──────────────────┘
//!        │        │
//!        ▼        ▼
//!   ┌───────┐ ┌──────┐
//!   │Bollard│ │ Mock │
//!   └───┬───┘ └──────┘
//!       ▼
//!   Docker Daemon
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use bollard::errors::Error as BollardError;
use futures::StreamExt;
use hivewatch_core::config::RuntimeSection;
use tracing::debug;

use crate::error::RuntimeError;
use crate::runtime::{ContainerRuntime, InstanceInfo, validate_instance_ref};

/// Docker-backed runtime.
///
/// Internally uses `Arc<bollard::Docker>` for cheap sharing across async tasks.
///
/// # Examples
///
/// ```ignore
/// use hivewatch_runtime::BollardRuntime;
///
/// let runtime = BollardRuntime::connect_with_socket("/run/docker.sock")?;
/// let logs = runtime.get_logs("abc123def456", 200).await?;
/// # Ok::<(), hivewatch_runtime::RuntimeError>(())
/// ```
#[derive(Clone)]
pub struct BollardRuntime {
    docker: Arc<bollard::Docker>,
}

impl BollardRuntime {
    /// Connects using the platform's default local socket.
    pub fn connect_local() -> Result<Self, RuntimeError> {
        let docker = bollard::Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Connection(format!("failed to connect to docker: {e}")))?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connects to a specific socket path.
    pub fn connect_with_socket(socket_path: &str) -> Result<Self, RuntimeError> {
        let docker =
            bollard::Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| {
                    RuntimeError::Connection(format!(
                        "failed to connect to docker at {socket_path}: {e}"
                    ))
                })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connects according to the `[runtime]` config section.
    ///
    /// An empty `docker_socket` falls back to the local defaults.
    pub fn from_config(section: &RuntimeSection) -> Result<Self, RuntimeError> {
        if section.docker_socket.is_empty() {
            Self::connect_local()
        } else {
            Self::connect_with_socket(&section.docker_socket)
        }
    }
}

fn map_api_error(err: BollardError, instance_ref: &str, op: &str) -> RuntimeError {
    match err {
        BollardError::DockerResponseServerError {
            status_code: 404, ..
        } => RuntimeError::NotFound(instance_ref.to_owned()),
        BollardError::IOError { .. } | BollardError::HyperResponseError { .. } => {
            RuntimeError::Connection(format!("{op} failed: {err}"))
        }
        other => RuntimeError::Api(format!("{op} failed: {other}")),
    }
}

impl ContainerRuntime for BollardRuntime {
    async fn get_logs(&self, instance_ref: &str, tail_lines: usize) -> Result<String, RuntimeError> {
        use bollard::container::LogsOptions;

        validate_instance_ref(instance_ref)?;

        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail_lines.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.logs(instance_ref, Some(options));
        let mut buffer = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| map_api_error(e, instance_ref, "get logs"))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk.into_bytes()));
        }

        debug!(
            instance_ref,
            bytes = buffer.len(),
            "fetched container log buffer"
        );
        Ok(buffer)
    }

    async fn list_labeled_instances(&self, label: &str) -> Result<Vec<InstanceInfo>, RuntimeError> {
        use bollard::container::ListContainersOptions;

        let mut filters = HashMap::new();
        filters.insert("label".to_owned(), vec![label.to_owned()]);

        let options = ListContainersOptions::<String> {
            all: true,
            filters,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| map_api_error(e, label, "list containers"))?;

        let mut result = Vec::with_capacity(containers.len());
        for container in containers {
            let id = container.id.unwrap_or_default();
            let name = container
                .names
                .unwrap_or_default()
                .first()
                .map(|n| n.trim_start_matches('/').to_owned())
                .unwrap_or_else(|| id.clone());
            let running = container.state.as_deref() == Some("running");

            result.push(InstanceInfo {
                id,
                name,
                labels: container.labels.unwrap_or_default(),
                running,
            });
        }

        Ok(result)
    }

    async fn ping(&self) -> Result<(), RuntimeError> {
        self.docker
            .ping()
            .await
            .map_err(|e| RuntimeError::Connection(format!("ping failed: {e}")))?;
        Ok(())
    }
}
