//! In-memory [`ContainerEngine`] for tests.
//!
//! Mirrors the Docker behaviours the lifecycle manager depends on: names are
//! unique, unknown ids are `NotFound`, start/stop are idempotent. Failures and
//! delays can be injected, and containers can be mutated "out of band" the way
//! another operator would.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{ContainerEngine, ContainerSpec, ContainerState, EngineError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeContainer {
    pub id: String,
    pub spec: ContainerSpec,
    pub running: bool,
}

#[derive(Default)]
struct FakeState {
    containers: HashMap<String, FakeContainer>,
    next_id: u64,
    create_failure: Option<EngineError>,
    start_failure: Option<EngineError>,
    stop_failure: Option<EngineError>,
    inspect_failure: Option<EngineError>,
    remove_failure: Option<EngineError>,
    create_delay: Option<Duration>,
    inspect_delay: Option<Duration>,
}

/// Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct FakeEngine {
    state: Arc<Mutex<FakeState>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `create` fail without creating anything.
    pub fn fail_next_create(&self, err: EngineError) {
        self.lock().create_failure = Some(err);
    }

    /// Make the next `start` fail.
    pub fn fail_next_start(&self, err: EngineError) {
        self.lock().start_failure = Some(err);
    }

    /// Make the next `stop` fail.
    pub fn fail_next_stop(&self, err: EngineError) {
        self.lock().stop_failure = Some(err);
    }

    /// Make every `inspect` fail until cleared with `None`.
    pub fn fail_inspect(&self, err: Option<EngineError>) {
        self.lock().inspect_failure = err;
    }

    /// Make every `remove` fail until cleared with `None`.
    pub fn fail_remove(&self, err: Option<EngineError>) {
        self.lock().remove_failure = err;
    }

    /// Register the container, then sleep before answering `create`.
    pub fn delay_create(&self, delay: Duration) {
        self.lock().create_delay = Some(delay);
    }

    pub fn delay_inspect(&self, delay: Option<Duration>) {
        self.lock().inspect_delay = delay;
    }

    /// Remove a container behind the manager's back.
    pub fn remove_out_of_band(&self, id: &str) -> bool {
        self.lock().containers.remove(id).is_some()
    }

    /// Start or stop a container behind the manager's back.
    pub fn set_running_out_of_band(&self, id: &str, running: bool) {
        if let Some(c) = self.lock().containers.get_mut(id) {
            c.running = running;
        }
    }

    pub fn container(&self, id: &str) -> Option<FakeContainer> {
        self.lock().containers.get(id).cloned()
    }

    pub fn container_by_name(&self, name: &str) -> Option<FakeContainer> {
        self.lock()
            .containers
            .values()
            .find(|c| c.spec.name == name)
            .cloned()
    }

    pub fn containers_on_port(&self, port: u16) -> Vec<FakeContainer> {
        self.lock()
            .containers
            .values()
            .filter(|c| c.spec.port == port)
            .cloned()
            .collect()
    }

    pub fn container_count(&self) -> usize {
        self.lock().containers.len()
    }

    /// Accept either an id or a name, like Docker does.
    fn resolve(state: &FakeState, id_or_name: &str) -> Option<String> {
        if state.containers.contains_key(id_or_name) {
            return Some(id_or_name.to_string());
        }
        state
            .containers
            .values()
            .find(|c| c.spec.name == id_or_name)
            .map(|c| c.id.clone())
    }
}

impl ContainerEngine for FakeEngine {
    async fn create(&self, spec: &ContainerSpec) -> Result<String, EngineError> {
        let (id, delay) = {
            let mut state = self.lock();
            if let Some(err) = state.create_failure.take() {
                return Err(err);
            }
            if state.containers.values().any(|c| c.spec.name == spec.name) {
                return Err(EngineError::Conflict(spec.name.clone()));
            }
            state.next_id += 1;
            let id = format!("fake-{:04}", state.next_id);
            state.containers.insert(
                id.clone(),
                FakeContainer {
                    id: id.clone(),
                    spec: spec.clone(),
                    running: false,
                },
            );
            (id, state.create_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<(), EngineError> {
        let mut state = self.lock();
        if let Some(err) = state.start_failure.take() {
            return Err(err);
        }
        let key = Self::resolve(&state, id).ok_or_else(|| EngineError::NotFound(id.into()))?;
        if let Some(c) = state.containers.get_mut(&key) {
            c.running = true;
        }
        Ok(())
    }

    async fn stop(&self, id: &str) -> Result<(), EngineError> {
        let mut state = self.lock();
        if let Some(err) = state.stop_failure.take() {
            return Err(err);
        }
        let key = Self::resolve(&state, id).ok_or_else(|| EngineError::NotFound(id.into()))?;
        if let Some(c) = state.containers.get_mut(&key) {
            c.running = false;
        }
        Ok(())
    }

    async fn remove(&self, id: &str, force: bool) -> Result<(), EngineError> {
        let mut state = self.lock();
        if let Some(err) = state.remove_failure.clone() {
            return Err(err);
        }
        let key = Self::resolve(&state, id).ok_or_else(|| EngineError::NotFound(id.into()))?;
        if !force && state.containers.get(&key).is_some_and(|c| c.running) {
            return Err(EngineError::Conflict(format!("{id} is running")));
        }
        state.containers.remove(&key);
        Ok(())
    }

    async fn inspect(&self, id: &str) -> Result<ContainerState, EngineError> {
        let delay = self.lock().inspect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.lock();
        if let Some(err) = state.inspect_failure.clone() {
            return Err(err);
        }
        let key = Self::resolve(&state, id).ok_or_else(|| EngineError::NotFound(id.into()))?;
        let (running, labels) = state
            .containers
            .get(&key)
            .map(|c| (c.running, c.spec.labels.clone()))
            .unwrap_or_default();
        Ok(ContainerState {
            running,
            status: if running { "running" } else { "exited" }.to_string(),
            labels,
        })
    }
}
