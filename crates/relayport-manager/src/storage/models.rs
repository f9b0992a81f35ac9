//! Data models for relayport storage.

use serde::{Deserialize, Serialize};

/// An upstream SOCKS relay that services forward to.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Node {
    pub id: i64,
    pub name: String,
    pub host: String,
    pub port: i64,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub region: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: i64,
}

impl Node {
    /// Username/password pair, only when both halves are present and non-empty.
    pub fn credential(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub contact_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: i64,
}

/// A provisioned proxy.
///
/// `container_id` is a weak reference: the container may have vanished from
/// the engine at any time. `status` is the last state this manager observed.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id: i64,
    pub port: i64,
    #[serde(skip_serializing)]
    pub password: String,
    pub method: String,
    pub node_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub container_id: Option<String>,
    pub status: String,
    pub expires_at: Option<i64>,
    pub created_at: i64,
}

/// A service row joined with its node and customer labels. Carries no secrets.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceRow {
    pub id: i64,
    pub port: i64,
    pub method: String,
    pub node_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub container_id: Option<String>,
    pub status: String,
    pub expires_at: Option<i64>,
    pub created_at: i64,
    pub node_name: Option<String>,
    pub node_host: Option<String>,
    pub customer_name: Option<String>,
}

/// Persisted lifecycle status of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Running,
    Stopped,
}

impl ServiceStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
