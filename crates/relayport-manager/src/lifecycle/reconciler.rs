//! Read path: stored rows decorated with live container state.

use futures::future::join_all;
use serde::{Serialize, Serializer};
use tracing::{debug, instrument, warn};

use relayport_core::db::unix_timestamp;

use crate::engine::{ContainerEngine, EngineError};
use crate::storage::{ServiceRow, ServiceStore};

use super::{LifecycleError, LifecycleManager};

/// What the engine says about a service's container right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeStatus {
    /// Engine status word (`running`, `exited`, `created`, ...).
    Engine(String),
    /// A container is bound but the engine could not produce it.
    Missing,
    /// No container is bound.
    Unknown,
}

impl RuntimeStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Engine(status) => status,
            Self::Missing => "missing",
            Self::Unknown => "unknown",
        }
    }
}

impl Serialize for RuntimeStatus {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceView {
    #[serde(flatten)]
    pub service: ServiceRow,
    /// Independent of the stored `status`.
    pub runtime_status: RuntimeStatus,
    /// Expiry already passed when the listing was taken.
    pub expired: bool,
}

impl<S: ServiceStore, E: ContainerEngine> LifecycleManager<S, E> {
    /// All services, newest first, each annotated with live runtime status.
    ///
    /// Never mutates anything. A failed or timed-out lookup marks only that
    /// row `missing`.
    #[instrument(skip(self))]
    pub async fn list_with_status(&self) -> Result<Vec<ServiceView>, LifecycleError> {
        let rows = self
            .store
            .list_services_joined()
            .await
            .map_err(LifecycleError::Storage)?;

        let statuses = join_all(
            rows.iter()
                .map(|row| self.runtime_status(row.container_id.as_deref())),
        )
        .await;

        let now = unix_timestamp();
        let views: Vec<ServiceView> = rows
            .into_iter()
            .zip(statuses)
            .map(|(service, runtime_status)| ServiceView {
                expired: service.expires_at.is_some_and(|at| at <= now),
                runtime_status,
                service,
            })
            .collect();

        debug!(count = views.len(), "Listed services");
        Ok(views)
    }

    async fn runtime_status(&self, container_id: Option<&str>) -> RuntimeStatus {
        let Some(container_id) = container_id.filter(|c| !c.is_empty()) else {
            return RuntimeStatus::Unknown;
        };

        match self.engine_call(self.engine.inspect(container_id)).await {
            Ok(state) => RuntimeStatus::Engine(state.status),
            Err(EngineError::NotFound(_)) => {
                debug!(container_id, "Container missing from engine");
                RuntimeStatus::Missing
            }
            Err(e) => {
                warn!(container_id, error = %e, "Container lookup failed");
                RuntimeStatus::Missing
            }
        }
    }
}
