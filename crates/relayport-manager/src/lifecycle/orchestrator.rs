//! Create, delete and toggle protocols.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::engine::{ContainerEngine, ContainerSpec, EngineError, REQUEST_LABEL, container_name};
use crate::proxy_config::{CipherMethod, ListenerSettings, build_proxy_config};
use crate::storage::{DatabaseError, NewService, Service, ServiceStatus, ServiceStore};

use super::{LifecycleError, LifecycleManager};

/// Desired service, as handed over by the transport layer.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateServiceRequest {
    pub port: i64,
    pub password: String,
    #[serde(default)]
    pub method: Option<String>,
    pub node_id: i64,
    #[serde(default)]
    pub customer_id: Option<i64>,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSummary {
    pub id: i64,
    pub port: i64,
    pub method: String,
    pub node_id: i64,
    pub customer_id: Option<i64>,
    pub container_id: String,
    pub container_name: String,
    pub status: ServiceStatus,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDeletion {
    pub id: i64,
    pub port: i64,
    /// `false` when the container was already gone or the engine refused.
    pub container_removed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToggleResult {
    pub id: i64,
    pub status: ServiceStatus,
}

/// Request fields after validation.
struct ValidCreate {
    port: u16,
    method: CipherMethod,
}

impl<S: ServiceStore, E: ContainerEngine> LifecycleManager<S, E> {
    /// Provision a container for the request and record it.
    ///
    /// Steps run strictly in order: resolve node (and customer), check the
    /// port, build the config, create and start the container, insert the
    /// row. A failed insert removes the container again before returning.
    #[instrument(skip(self, request), fields(port = request.port, node_id = request.node_id))]
    pub async fn create_service(
        &self,
        request: CreateServiceRequest,
    ) -> Result<ServiceSummary, LifecycleError> {
        let valid = self.validate_create(&request)?;

        let node = match self.store.get_node(request.node_id).await {
            Ok(node) => node,
            Err(DatabaseError::NotFound(_)) => {
                return Err(LifecycleError::InvalidReference(format!(
                    "node {} does not exist",
                    request.node_id
                )));
            }
            Err(e) => return Err(LifecycleError::Storage(e)),
        };
        if !node.is_active() {
            debug!(node_id = node.id, status = %node.status, "Provisioning against inactive node");
        }

        if let Some(customer_id) = request.customer_id {
            match self.store.get_customer(customer_id).await {
                Ok(_) => {}
                Err(DatabaseError::NotFound(_)) => {
                    return Err(LifecycleError::InvalidReference(format!(
                        "customer {customer_id} does not exist"
                    )));
                }
                Err(e) => return Err(LifecycleError::Storage(e)),
            }
        }

        if self
            .store
            .port_in_use(valid.port)
            .await
            .map_err(LifecycleError::Storage)?
        {
            return Err(LifecycleError::PortInUse(valid.port));
        }

        let config = build_proxy_config(
            &ListenerSettings {
                port: valid.port,
                password: &request.password,
                method: valid.method,
            },
            &node,
        );
        let env_entry = config.to_env_entry().map_err(|e| {
            LifecycleError::ProvisionFailed(format!("failed to encode proxy config: {e}"))
        })?;

        let spec = ContainerSpec {
            name: container_name(&self.settings.name_prefix, valid.port),
            image: self.settings.image.clone(),
            port: valid.port,
            env: vec![env_entry],
            labels: [(REQUEST_LABEL.to_string(), uuid::Uuid::new_v4().to_string())]
                .into_iter()
                .collect(),
            restart_policy: self.settings.restart_policy,
        };
        let container_id = self.provision(&spec).await?;

        let record = NewService {
            port: valid.port,
            password: request.password.clone(),
            method: valid.method.as_str().to_string(),
            node_id: node.id,
            customer_id: request.customer_id,
            container_id: container_id.clone(),
            status: ServiceStatus::Running,
            expires_at: request.expires_at,
        };

        let id = match self.store.insert_service(&record).await {
            Ok(id) => id,
            Err(e) => {
                warn!(container_id = %container_id, error = %e, "Service insert failed, removing container");
                self.discard_container(&container_id).await;
                return Err(match e {
                    DatabaseError::UniqueViolation(_) => LifecycleError::PortInUse(valid.port),
                    other => LifecycleError::PersistenceFailed(other),
                });
            }
        };

        info!(service_id = id, container_id = %container_id, "Service created");

        Ok(ServiceSummary {
            id,
            port: i64::from(valid.port),
            method: record.method,
            node_id: node.id,
            customer_id: request.customer_id,
            container_id,
            container_name: spec.name,
            status: ServiceStatus::Running,
            expires_at: request.expires_at,
        })
    }

    /// Remove the service's container (best effort) and then its row.
    #[instrument(skip(self))]
    pub async fn delete_service(&self, id: i64) -> Result<ServiceDeletion, LifecycleError> {
        let service = self.lookup_service(id).await?;

        let mut container_removed = false;
        if let Some(container_id) = bound_container(&service) {
            match self
                .engine_call(self.engine.remove(container_id, true))
                .await
            {
                Ok(()) => container_removed = true,
                Err(EngineError::NotFound(_)) => {
                    info!(container_id, "Container already gone");
                }
                Err(e) => {
                    warn!(container_id, error = %e, "Container removal failed, deleting record anyway");
                }
            }
        }

        match self.store.delete_service(id).await {
            Ok(true) => {}
            Ok(false) => return Err(LifecycleError::NotFound(id)),
            Err(e) => return Err(LifecycleError::PersistenceFailed(e)),
        }

        info!(port = service.port, container_removed, "Service deleted");

        Ok(ServiceDeletion {
            id,
            port: service.port,
            container_removed,
        })
    }

    /// Flip the container between running and stopped.
    ///
    /// The decision is taken from a live inspect, never from the stored
    /// status. Someone else may touch the container between inspect and
    /// act; the last write to the status column wins.
    #[instrument(skip(self))]
    pub async fn toggle_service(&self, id: i64) -> Result<ToggleResult, LifecycleError> {
        let service = self.lookup_service(id).await?;
        let container_id = bound_container(&service).ok_or(LifecycleError::NoContainer(id))?;

        let state = self
            .engine_call(self.engine.inspect(container_id))
            .await
            .map_err(|e| match e {
                EngineError::NotFound(_) => LifecycleError::EngineUnavailable(format!(
                    "container {container_id} is missing from the engine"
                )),
                other => LifecycleError::EngineUnavailable(other.to_string()),
            })?;

        let status = if state.running {
            self.engine_call(self.engine.stop(container_id))
                .await
                .map_err(|e| LifecycleError::EngineUnavailable(e.to_string()))?;
            ServiceStatus::Stopped
        } else {
            self.engine_call(self.engine.start(container_id))
                .await
                .map_err(|e| LifecycleError::EngineUnavailable(e.to_string()))?;
            ServiceStatus::Running
        };

        if service.status != status.as_str() {
            debug!(stored = %service.status, "Stored status was stale");
        }

        self.store
            .update_service_status(id, status)
            .await
            .map_err(LifecycleError::PersistenceFailed)?;

        info!(%status, "Service toggled");

        Ok(ToggleResult { id, status })
    }

    fn validate_create(&self, request: &CreateServiceRequest) -> Result<ValidCreate, LifecycleError> {
        let port = u16::try_from(request.port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                LifecycleError::InvalidInput(format!(
                    "port must be between 1 and 65535, got {}",
                    request.port
                ))
            })?;

        if request.password.trim().is_empty() {
            return Err(LifecycleError::InvalidInput(
                "password is required".to_string(),
            ));
        }

        let method = match request.method.as_deref().map(str::trim) {
            None | Some("") => self.settings.default_method,
            Some(name) => name
                .parse::<CipherMethod>()
                .map_err(|e| LifecycleError::InvalidInput(e.to_string()))?,
        };

        if let Some(expires_at) = request.expires_at
            && expires_at <= 0
        {
            return Err(LifecycleError::InvalidInput(format!(
                "expires_at must be a positive unix timestamp, got {expires_at}"
            )));
        }

        Ok(ValidCreate { port, method })
    }

    async fn lookup_service(&self, id: i64) -> Result<Service, LifecycleError> {
        match self.store.get_service(id).await {
            Ok(service) => Ok(service),
            Err(DatabaseError::NotFound(_)) => Err(LifecycleError::NotFound(id)),
            Err(e) => Err(LifecycleError::Storage(e)),
        }
    }

    /// Create and start the container, undoing partial work on failure.
    async fn provision(&self, spec: &ContainerSpec) -> Result<String, LifecycleError> {
        let container_id = match self.engine_call(self.engine.create(spec)).await {
            Ok(id) => id,
            Err(EngineError::Conflict(_)) => {
                warn!(container = %spec.name, "Container name already taken");
                return Err(LifecycleError::PortInUse(spec.port));
            }
            Err(e @ EngineError::Timeout(_)) => {
                // The engine may have created it anyway.
                warn!(container = %spec.name, "Container create timed out");
                self.discard_timed_out_create(spec).await;
                return Err(LifecycleError::ProvisionFailed(e.to_string()));
            }
            Err(e) => {
                error!(container = %spec.name, error = %e, "Container create failed");
                return Err(LifecycleError::ProvisionFailed(e.to_string()));
            }
        };

        if let Err(e) = self.engine_call(self.engine.start(&container_id)).await {
            error!(container_id = %container_id, error = %e, "Container start failed");
            self.discard_container(&container_id).await;
            return Err(LifecycleError::ProvisionFailed(format!(
                "failed to start container: {e}"
            )));
        }

        Ok(container_id)
    }

    /// Remove the container left under `spec.name` by a timed-out create, but
    /// only when its request label shows this create made it. A concurrent
    /// create for the same port may own the name.
    async fn discard_timed_out_create(&self, spec: &ContainerSpec) {
        let token = spec.labels.get(REQUEST_LABEL);
        match self.engine_call(self.engine.inspect(&spec.name)).await {
            Ok(state) if state.labels.get(REQUEST_LABEL) == token => {
                self.discard_container(&spec.name).await;
            }
            Ok(_) => {
                warn!(container = %spec.name, "Container name held by another request, leaving it");
            }
            Err(EngineError::NotFound(_)) => {
                debug!(container = %spec.name, "Timed-out create left nothing behind");
            }
            Err(e) => {
                error!(container = %spec.name, error = %e, "Cannot verify timed-out create, container may be orphaned");
            }
        }
    }

    /// Compensating forced removal. Never fails; a leftover container is
    /// logged for the operator.
    async fn discard_container(&self, target: &str) {
        match self.engine_call(self.engine.remove(target, true)).await {
            Ok(()) => info!(container = target, "Compensating removal succeeded"),
            Err(EngineError::NotFound(_)) => {
                debug!(container = target, "Nothing to remove");
            }
            Err(e) => {
                error!(container = target, error = %e, "Compensating removal failed, container may be orphaned");
            }
        }
    }
}

fn bound_container(service: &Service) -> Option<&str> {
    service.container_id.as_deref().filter(|c| !c.is_empty())
}
