//! Container engine client.
//!
//! A thin capability interface over the container runtime. The engine is
//! shared with other actors and may change state behind our back, so every
//! answer it gives is authoritative over what the store remembers.

mod docker;
#[cfg(any(test, feature = "test-utils"))]
mod fake;

use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

pub use docker::DockerEngine;
#[cfg(any(test, feature = "test-utils"))]
pub use fake::{FakeContainer, FakeEngine};

/// Restart behaviour requested for a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    No,
    Always,
    UnlessStopped,
    OnFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported restart policy '{0}'")]
pub struct UnknownRestartPolicy(pub String);

impl FromStr for RestartPolicy {
    type Err = UnknownRestartPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no" => Ok(Self::No),
            "always" => Ok(Self::Always),
            "unless-stopped" => Ok(Self::UnlessStopped),
            "on-failure" => Ok(Self::OnFailure),
            _ => Err(UnknownRestartPolicy(s.to_string())),
        }
    }
}

/// Label carrying the token of the create request that made a container.
pub const REQUEST_LABEL: &str = "relayport.request";

/// Everything needed to create one proxy container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Deterministic name, see [`container_name`].
    pub name: String,
    pub image: String,
    /// Published on the host for both TCP and UDP.
    pub port: u16,
    /// `KEY=value` entries.
    pub env: Vec<String>,
    pub labels: HashMap<String, String>,
    pub restart_policy: RestartPolicy,
}

/// Live state reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerState {
    pub running: bool,
    /// Engine status word (`running`, `exited`, `created`, ...).
    pub status: String,
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("Container not found: {0}")]
    NotFound(String),

    #[error("Container name already in use: {0}")]
    Conflict(String),

    #[error("Engine call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Engine API error: {0}")]
    Api(String),
}

/// Name a proxy container after the port it serves, so an operator (or a
/// later sweep) can recognise orphans.
pub fn container_name(prefix: &str, port: u16) -> String {
    format!("{prefix}-{port}")
}

/// Create/start/stop/remove/inspect containers by name or id.
///
/// Implementations must treat removing an unknown container as
/// [`EngineError::NotFound`], and starting a running (or stopping a stopped)
/// container as success.
pub trait ContainerEngine: Send + Sync {
    /// Create a container and return its id. Does not start it.
    fn create(
        &self,
        spec: &ContainerSpec,
    ) -> impl Future<Output = Result<String, EngineError>> + Send;

    fn start(&self, id: &str) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn stop(&self, id: &str) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn remove(&self, id: &str, force: bool)
    -> impl Future<Output = Result<(), EngineError>> + Send;

    fn inspect(&self, id: &str) -> impl Future<Output = Result<ContainerState, EngineError>> + Send;
}
