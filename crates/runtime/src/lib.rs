//! Container runtime access for hivewatch.
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`RuntimeError`)
//! - [`runtime`]: The [`ContainerRuntime`] trait and [`InstanceInfo`]
//! - [`docker`]: Docker implementation ([`BollardRuntime`])
//! - `mock`: In-memory runtime for tests (`mock` feature)

pub mod docker;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod runtime;

pub use docker::BollardRuntime;
pub use error::RuntimeError;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockRuntime;
pub use runtime::{ContainerRuntime, InstanceInfo, validate_instance_ref};
