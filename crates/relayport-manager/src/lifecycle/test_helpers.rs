//! Shared setup for lifecycle test modules.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::engine::{FakeEngine, RestartPolicy};
use crate::proxy_config::CipherMethod;
use crate::storage::{
    Customer, DatabaseError, ManagerDatabase, NewCustomer, NewNode, NewService, Node, Service,
    ServiceRow, ServiceStatus, ServiceStore,
};

use super::{CreateServiceRequest, LifecycleManager, ProvisionSettings};

pub fn test_settings() -> ProvisionSettings {
    ProvisionSettings {
        image: "teddysun/xray".into(),
        name_prefix: "xray-converter".into(),
        engine_timeout: Duration::from_secs(5),
        default_method: CipherMethod::Aes256Gcm,
        restart_policy: RestartPolicy::UnlessStopped,
    }
}

/// Database with node 1 = 203.0.113.5:1080 and customer 1 = "alice".
pub async fn seeded_db() -> ManagerDatabase {
    let db = ManagerDatabase::open_in_memory().await.unwrap();
    db.create_node(&NewNode {
        name: "edge-1",
        host: "203.0.113.5",
        port: 1080,
        username: None,
        password: None,
        region: None,
        notes: None,
    })
    .await
    .unwrap();
    db.create_customer(&NewCustomer {
        name: "alice",
        contact_id: None,
        phone: None,
        email: None,
        notes: None,
    })
    .await
    .unwrap();
    db
}

pub async fn setup() -> (LifecycleManager<ManagerDatabase, FakeEngine>, FakeEngine) {
    let engine = FakeEngine::new();
    let manager = LifecycleManager::new(seeded_db().await, engine.clone(), test_settings());
    (manager, engine)
}

pub fn request(port: i64) -> CreateServiceRequest {
    CreateServiceRequest {
        port,
        password: "p@ss".into(),
        method: Some("aes-256-gcm".into()),
        node_id: 1,
        customer_id: None,
        expires_at: None,
    }
}

/// Insert a service row with no bound container, bypassing the orchestrator.
pub async fn insert_unbound_service(db: &ManagerDatabase, port: i64) -> i64 {
    let result = sqlx::query(
        "INSERT INTO services (port, password, method, node_id, container_id, status, created_at) VALUES (?, 'x', 'aes-256-gcm', 1, NULL, 'stopped', 0)",
    )
    .bind(port)
    .execute(db.pool())
    .await
    .unwrap();
    result.last_insert_rowid()
}

/// Store wrapper whose next insert or status update can be made to fail.
#[derive(Clone)]
pub struct FlakyStore {
    pub db: ManagerDatabase,
    insert_failure: Arc<Mutex<Option<DatabaseError>>>,
    status_update_failure: Arc<Mutex<Option<DatabaseError>>>,
}

impl FlakyStore {
    pub fn new(db: ManagerDatabase) -> Self {
        Self {
            db,
            insert_failure: Arc::new(Mutex::new(None)),
            status_update_failure: Arc::new(Mutex::new(None)),
        }
    }

    pub fn fail_next_insert(&self, err: DatabaseError) {
        *self.insert_failure.lock().unwrap() = Some(err);
    }

    pub fn fail_next_status_update(&self, err: DatabaseError) {
        *self.status_update_failure.lock().unwrap() = Some(err);
    }
}

impl ServiceStore for FlakyStore {
    async fn get_node(&self, id: i64) -> Result<Node, DatabaseError> {
        self.db.get_node(id).await
    }

    async fn get_customer(&self, id: i64) -> Result<Customer, DatabaseError> {
        self.db.get_customer(id).await
    }

    async fn port_in_use(&self, port: u16) -> Result<bool, DatabaseError> {
        self.db.port_in_use(port).await
    }

    async fn insert_service(&self, params: &NewService) -> Result<i64, DatabaseError> {
        let failure = self.insert_failure.lock().unwrap().take();
        if let Some(err) = failure {
            return Err(err);
        }
        self.db.insert_service(params).await
    }

    async fn get_service(&self, id: i64) -> Result<Service, DatabaseError> {
        self.db.get_service(id).await
    }

    async fn delete_service(&self, id: i64) -> Result<bool, DatabaseError> {
        self.db.delete_service(id).await
    }

    async fn update_service_status(
        &self,
        id: i64,
        status: ServiceStatus,
    ) -> Result<(), DatabaseError> {
        let failure = self.status_update_failure.lock().unwrap().take();
        if let Some(err) = failure {
            return Err(err);
        }
        self.db.update_service_status(id, status).await
    }

    async fn list_services_joined(&self) -> Result<Vec<ServiceRow>, DatabaseError> {
        self.db.list_services_joined().await
    }
}
