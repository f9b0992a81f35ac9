//! Docker implementation of [`ContainerEngine`] on top of `bollard`.

use std::collections::HashMap;

use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, RemoveContainerOptions,
    StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::models::{HostConfig, PortBinding, RestartPolicyNameEnum};
use tracing::debug;

use super::{ContainerEngine, ContainerSpec, ContainerState, EngineError, RestartPolicy};

/// Docker answers 304 when a container is already in the requested state.
const NOT_MODIFIED: u16 = 304;

#[derive(Clone)]
pub struct DockerEngine {
    docker: Docker,
    stop_grace_secs: i64,
}

impl DockerEngine {
    /// Connect using the local defaults (`DOCKER_HOST` or the local socket).
    pub fn connect(stop_grace_secs: u64) -> Result<Self, EngineError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;
        Ok(Self {
            docker,
            stop_grace_secs: i64::try_from(stop_grace_secs).unwrap_or(i64::MAX),
        })
    }
}

const fn restart_policy_name(policy: RestartPolicy) -> RestartPolicyNameEnum {
    match policy {
        RestartPolicy::No => RestartPolicyNameEnum::NO,
        RestartPolicy::Always => RestartPolicyNameEnum::ALWAYS,
        RestartPolicy::UnlessStopped => RestartPolicyNameEnum::UNLESS_STOPPED,
        RestartPolicy::OnFailure => RestartPolicyNameEnum::ON_FAILURE,
    }
}

fn map_error(target: &str, e: BollardError) -> EngineError {
    match e {
        BollardError::DockerResponseServerError {
            status_code: 404,
            message,
        } => EngineError::NotFound(format!("{target}: {message}")),
        BollardError::DockerResponseServerError {
            status_code: 409,
            message,
        } => EngineError::Conflict(format!("{target}: {message}")),
        BollardError::IOError { err } => EngineError::Unavailable(err.to_string()),
        other => EngineError::Api(other.to_string()),
    }
}

/// Swallow "already in that state" answers from start/stop.
fn ignore_not_modified(target: &str, result: Result<(), BollardError>) -> Result<(), EngineError> {
    match result {
        Ok(()) => Ok(()),
        Err(BollardError::DockerResponseServerError {
            status_code: NOT_MODIFIED,
            ..
        }) => {
            debug!(container = target, "Container already in requested state");
            Ok(())
        }
        Err(e) => Err(map_error(target, e)),
    }
}

impl ContainerEngine for DockerEngine {
    async fn create(&self, spec: &ContainerSpec) -> Result<String, EngineError> {
        let tcp = format!("{}/tcp", spec.port);
        let udp = format!("{}/udp", spec.port);
        let binding = || {
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(spec.port.to_string()),
            }])
        };

        let exposed_ports: HashMap<String, HashMap<(), ()>> = [
            (tcp.clone(), HashMap::new()),
            (udp.clone(), HashMap::new()),
        ]
        .into_iter()
        .collect();
        let port_bindings: HashMap<String, Option<Vec<PortBinding>>> =
            [(tcp, binding()), (udp, binding())].into_iter().collect();

        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            restart_policy: Some(bollard::models::RestartPolicy {
                name: Some(restart_policy_name(spec.restart_policy)),
                maximum_retry_count: None,
            }),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            labels: Some(spec.labels.clone()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| map_error(&spec.name, e))?;

        for warning in &response.warnings {
            debug!(container = %spec.name, warning = %warning, "Engine warning on create");
        }

        Ok(response.id)
    }

    async fn start(&self, id: &str) -> Result<(), EngineError> {
        let result = self.docker.start_container::<String>(id, None).await;
        ignore_not_modified(id, result)
    }

    async fn stop(&self, id: &str) -> Result<(), EngineError> {
        let result = self
            .docker
            .stop_container(
                id,
                Some(StopContainerOptions {
                    t: self.stop_grace_secs,
                }),
            )
            .await;
        ignore_not_modified(id, result)
    }

    async fn remove(&self, id: &str, force: bool) -> Result<(), EngineError> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| map_error(id, e))
    }

    async fn inspect(&self, id: &str) -> Result<ContainerState, EngineError> {
        let info = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| map_error(id, e))?;

        let labels = info
            .config
            .and_then(|config| config.labels)
            .unwrap_or_default();
        let state = info.state.unwrap_or_default();
        let running = state.running.unwrap_or(false);
        let status = state
            .status
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| if running { "running" } else { "exited" }.to_string());

        Ok(ContainerState {
            running,
            status,
            labels,
        })
    }
}
