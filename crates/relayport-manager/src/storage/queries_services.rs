//! Service queries for the relayport manager.

use relayport_core::db::unix_timestamp;

use super::db::{DatabaseError, ManagerDatabase};
use super::models::{Service, ServiceRow, ServiceStatus};

/// A service row to insert once its container is up.
#[derive(Debug, Clone)]
pub struct NewService {
    pub port: u16,
    pub password: String,
    pub method: String,
    pub node_id: i64,
    pub customer_id: Option<i64>,
    pub container_id: String,
    pub status: ServiceStatus,
    pub expires_at: Option<i64>,
}

impl ManagerDatabase {
    /// Whether any service currently holds `port`.
    pub async fn port_in_use(&self, port: u16) -> Result<bool, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM services WHERE port = ?")
            .bind(i64::from(port))
            .fetch_one(self.pool())
            .await?;

        Ok(row.0 > 0)
    }

    /// Insert a service row.
    ///
    /// A second row for the same port fails with
    /// [`DatabaseError::UniqueViolation`].
    pub async fn insert_service(&self, params: &NewService) -> Result<i64, DatabaseError> {
        let now = unix_timestamp();

        let result = sqlx::query(
            "INSERT INTO services (port, password, method, node_id, customer_id, container_id, status, expires_at, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(i64::from(params.port))
        .bind(&params.password)
        .bind(&params.method)
        .bind(params.node_id)
        .bind(params.customer_id)
        .bind(&params.container_id)
        .bind(params.status.as_str())
        .bind(params.expires_at)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Get a service by ID.
    pub async fn get_service(&self, id: i64) -> Result<Service, DatabaseError> {
        sqlx::query_as::<_, Service>("SELECT * FROM services WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Service {id}")))
    }

    /// Delete a service row.
    pub async fn delete_service(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM services WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record the last observed status of a service.
    pub async fn update_service_status(
        &self,
        id: i64,
        status: ServiceStatus,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE services SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Service {id}")));
        }
        Ok(())
    }

    /// All services with their node and customer labels, newest first.
    pub async fn list_services_joined(&self) -> Result<Vec<ServiceRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, ServiceRow>(
            "SELECT s.id, s.port, s.method, s.node_id, s.customer_id, s.container_id, s.status, \
             s.expires_at, s.created_at, n.name AS node_name, n.host AS node_host, \
             c.name AS customer_name \
             FROM services s \
             LEFT JOIN nodes n ON s.node_id = n.id \
             LEFT JOIN customers c ON s.customer_id = c.id \
             ORDER BY s.created_at DESC, s.id DESC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }
}
