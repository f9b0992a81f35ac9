//! Proxy service lifecycle manager.
//!
//! [`LifecycleManager`] is the coordinator that:
//! - validates create requests against the store (node, customer, port)
//! - drives the container engine to create/start/stop/remove containers
//! - commits service rows, or compensates by removing the container
//! - decorates stored rows with live runtime status for listings
//!
//! No in-memory lock is held across store or engine calls; concurrent creates
//! for one port are settled by the store's `UNIQUE(port)` constraint.

mod error;
mod orchestrator;
mod outcome;
mod reconciler;

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod test_helpers;

use std::future::Future;
use std::time::Duration;

use relayport_core::ManagerConfig;

use crate::engine::{ContainerEngine, EngineError, RestartPolicy};
use crate::proxy_config::CipherMethod;
use crate::storage::ServiceStore;

pub use error::LifecycleError;
pub use orchestrator::{CreateServiceRequest, ServiceDeletion, ServiceSummary, ToggleResult};
pub use outcome::Outcome;
pub use reconciler::{RuntimeStatus, ServiceView};

/// How containers are provisioned.
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    pub image: String,
    pub name_prefix: String,
    /// Upper bound for every engine call.
    pub engine_timeout: Duration,
    pub default_method: CipherMethod,
    pub restart_policy: RestartPolicy,
}

impl TryFrom<&ManagerConfig> for ProvisionSettings {
    type Error = relayport_core::Error;

    fn try_from(config: &ManagerConfig) -> Result<Self, Self::Error> {
        config.validate()?;
        let default_method = config
            .default_method
            .parse::<CipherMethod>()
            .map_err(|e| relayport_core::Error::Config(e.to_string()))?;
        let restart_policy = config
            .restart_policy
            .parse::<RestartPolicy>()
            .map_err(|e| relayport_core::Error::Config(e.to_string()))?;
        Ok(Self {
            image: config.image.clone(),
            name_prefix: config.container_name_prefix.clone(),
            engine_timeout: config.engine_timeout(),
            default_method,
            restart_policy,
        })
    }
}

/// Store + engine, explicitly constructed and owned for the process lifetime.
pub struct LifecycleManager<S, E> {
    store: S,
    engine: E,
    settings: ProvisionSettings,
}

impl<S: ServiceStore, E: ContainerEngine> LifecycleManager<S, E> {
    pub const fn new(store: S, engine: E, settings: ProvisionSettings) -> Self {
        Self {
            store,
            engine,
            settings,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Bound an engine call by the configured timeout.
    async fn engine_call<T>(
        &self,
        call: impl Future<Output = Result<T, EngineError>>,
    ) -> Result<T, EngineError> {
        let limit = self.settings.engine_timeout;
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(EngineError::Timeout(limit)))
    }
}
