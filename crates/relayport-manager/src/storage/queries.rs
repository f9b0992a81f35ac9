//! Node and customer queries for the relayport manager.

use relayport_core::db::unix_timestamp;

use super::db::{DatabaseError, ManagerDatabase};
use super::models::{Customer, Node};

/// Parameters for registering a relay node.
#[derive(Debug, Clone, Copy)]
pub struct NewNode<'a> {
    pub name: &'a str,
    pub host: &'a str,
    pub port: u16,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub region: Option<&'a str>,
    pub notes: Option<&'a str>,
}

/// Parameters for creating a customer.
#[derive(Debug, Clone, Copy)]
pub struct NewCustomer<'a> {
    pub name: &'a str,
    pub contact_id: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub email: Option<&'a str>,
    pub notes: Option<&'a str>,
}

impl NewNode<'_> {
    /// Name and host must be non-blank. The port is non-zero by type.
    pub fn validate(&self) -> Result<(), DatabaseError> {
        if self.name.trim().is_empty() {
            return Err(DatabaseError::Invalid("node name is required".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(DatabaseError::Invalid("node host is required".to_string()));
        }
        if self.port == 0 {
            return Err(DatabaseError::Invalid(
                "node port must be between 1 and 65535".to_string(),
            ));
        }
        Ok(())
    }
}

impl NewCustomer<'_> {
    pub fn validate(&self) -> Result<(), DatabaseError> {
        if self.name.trim().is_empty() {
            return Err(DatabaseError::Invalid(
                "customer name is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl ManagerDatabase {
    // =========================================================================
    // Node queries
    // =========================================================================

    /// Register a relay node.
    pub async fn create_node(&self, params: &NewNode<'_>) -> Result<Node, DatabaseError> {
        params.validate()?;
        let now = unix_timestamp();

        let result = sqlx::query(
            "INSERT INTO nodes (name, host, port, username, password, region, created_at, notes) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(params.name)
        .bind(params.host)
        .bind(i64::from(params.port))
        .bind(params.username)
        .bind(params.password)
        .bind(params.region)
        .bind(now)
        .bind(params.notes)
        .execute(self.pool())
        .await?;

        self.get_node(result.last_insert_rowid()).await
    }

    /// Get a node by ID.
    pub async fn get_node(&self, id: i64) -> Result<Node, DatabaseError> {
        sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Node {id}")))
    }

    /// List all nodes, newest first.
    pub async fn list_nodes(&self) -> Result<Vec<Node>, DatabaseError> {
        let nodes =
            sqlx::query_as::<_, Node>("SELECT * FROM nodes ORDER BY created_at DESC, id DESC")
                .fetch_all(self.pool())
                .await?;

        Ok(nodes)
    }

    /// Update node status (`active` or anything else).
    pub async fn update_node_status(&self, id: i64, status: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE nodes SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove a node. Services that referenced it keep a null `node_id`.
    pub async fn remove_node(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM nodes WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Customer queries
    // =========================================================================

    /// Create a customer.
    pub async fn create_customer(
        &self,
        params: &NewCustomer<'_>,
    ) -> Result<Customer, DatabaseError> {
        params.validate()?;
        let now = unix_timestamp();

        let result = sqlx::query(
            "INSERT INTO customers (name, contact_id, phone, email, notes, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(params.name)
        .bind(params.contact_id)
        .bind(params.phone)
        .bind(params.email)
        .bind(params.notes)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_customer(result.last_insert_rowid()).await
    }

    /// Get a customer by ID.
    pub async fn get_customer(&self, id: i64) -> Result<Customer, DatabaseError> {
        sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Customer {id}")))
    }

    /// List all customers, newest first.
    pub async fn list_customers(&self) -> Result<Vec<Customer>, DatabaseError> {
        let customers = sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(customers)
    }

    /// Remove a customer. Services that referenced it keep a null `customer_id`.
    pub async fn remove_customer(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM customers WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
