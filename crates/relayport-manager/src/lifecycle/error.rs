//! Typed failures of lifecycle operations.

use crate::storage::DatabaseError;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Missing or malformed request field.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A node or customer id that does not resolve.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Port already held by a service or claimed by a concurrent create.
    #[error("Port {0} is already in use")]
    PortInUse(u16),

    #[error("Provisioning failed: {0}")]
    ProvisionFailed(String),

    /// Store write failed after the engine side took effect.
    #[error("Failed to persist service: {0}")]
    PersistenceFailed(#[source] DatabaseError),

    #[error("Service {0} not found")]
    NotFound(i64),

    #[error("Service {0} has no container")]
    NoContainer(i64),

    #[error("Container engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Store read failed before any side effect.
    #[error("Storage error: {0}")]
    Storage(#[source] DatabaseError),
}

impl LifecycleError {
    /// Stable machine-readable code for transport layers.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidReference(_) => "invalid_reference",
            Self::PortInUse(_) => "port_in_use",
            Self::ProvisionFailed(_) => "provision_failed",
            Self::PersistenceFailed(_) => "persistence_failed",
            Self::NotFound(_) => "not_found",
            Self::NoContainer(_) => "no_container",
            Self::EngineUnavailable(_) => "engine_unavailable",
            Self::Storage(_) => "storage_error",
        }
    }
}
