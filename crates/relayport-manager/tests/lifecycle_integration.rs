#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity

//! Integration tests for the lifecycle manager.
//!
//! Runs the full service lifecycle against a file-backed database and the
//! in-memory engine: register node and customer, create, list, toggle,
//! delete, and reopen the database between steps.

use std::time::Duration;

use relayport_core::ManagerConfig;
use relayport_manager::engine::{ContainerEngine, FakeEngine};
use relayport_manager::lifecycle::{
    CreateServiceRequest, LifecycleManager, Outcome, ProvisionSettings, RuntimeStatus,
};
use relayport_manager::storage::{ManagerDatabase, NewCustomer, NewNode, ServiceStatus};

fn settings() -> ProvisionSettings {
    let config = ManagerConfig {
        engine_timeout_secs: 5,
        ..ManagerConfig::default()
    };
    ProvisionSettings::try_from(&config).unwrap()
}

async fn register_node_and_customer(db: &ManagerDatabase) -> (i64, i64) {
    let node = db
        .create_node(&NewNode {
            name: "edge-1",
            host: "198.51.100.7",
            port: 1080,
            username: Some("relay"),
            password: Some("secret"),
            region: Some("eu"),
            notes: None,
        })
        .await
        .unwrap();
    let customer = db
        .create_customer(&NewCustomer {
            name: "alice",
            contact_id: Some("@alice"),
            phone: None,
            email: None,
            notes: None,
        })
        .await
        .unwrap();
    (node.id, customer.id)
}

#[tokio::test]
async fn service_survives_reopen_and_full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("relayport.db");
    let engine = FakeEngine::new();

    let (node_id, customer_id, service_id, container_id) = {
        let db = ManagerDatabase::open(&path).await.unwrap();
        let (node_id, customer_id) = register_node_and_customer(&db).await;
        let manager = LifecycleManager::new(db, engine.clone(), settings());

        let summary = manager
            .create_service(CreateServiceRequest {
                port: 8388,
                password: "p@ss".into(),
                method: None,
                node_id,
                customer_id: Some(customer_id),
                expires_at: None,
            })
            .await
            .unwrap();
        assert_eq!(summary.container_name, "xray-converter-8388");
        (node_id, customer_id, summary.id, summary.container_id)
    };

    // Node credentials reach the container config.
    let container = engine.container(&container_id).unwrap();
    assert!(container.spec.env[0].contains("\"user\":\"relay\""));

    let db = ManagerDatabase::open(&path).await.unwrap();
    let manager = LifecycleManager::new(db, engine.clone(), settings());

    let views = manager.list_with_status().await.unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].service.id, service_id);
    assert_eq!(views[0].service.node_id, Some(node_id));
    assert_eq!(views[0].service.customer_id, Some(customer_id));
    assert_eq!(
        views[0].runtime_status,
        RuntimeStatus::Engine("running".into())
    );

    let toggled = manager.toggle_service(service_id).await.unwrap();
    assert_eq!(toggled.status, ServiceStatus::Stopped);
    assert!(!engine.inspect(&container_id).await.unwrap().running);

    let deletion = manager.delete_service(service_id).await.unwrap();
    assert!(deletion.container_removed);
    assert_eq!(engine.container_count(), 0);
    assert!(manager.list_with_status().await.unwrap().is_empty());
}

#[tokio::test]
async fn removing_node_keeps_service_listable() {
    let db = ManagerDatabase::open_in_memory().await.unwrap();
    let (node_id, _) = register_node_and_customer(&db).await;
    let manager = LifecycleManager::new(db.clone(), FakeEngine::new(), settings());

    manager
        .create_service(CreateServiceRequest {
            port: 8400,
            password: "p@ss".into(),
            method: Some("chacha20-ietf-poly1305".into()),
            node_id,
            customer_id: None,
            expires_at: None,
        })
        .await
        .unwrap();
    assert!(db.remove_node(node_id).await.unwrap());

    let views = manager.list_with_status().await.unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].service.node_id, None);
    assert_eq!(views[0].service.node_name, None);
    assert_eq!(views[0].service.method, "chacha20-poly1305");
}

#[tokio::test]
async fn envelope_reports_failures_with_codes() {
    let db = ManagerDatabase::open_in_memory().await.unwrap();
    let engine = FakeEngine::new();
    let manager = LifecycleManager::new(
        db,
        engine,
        ProvisionSettings {
            engine_timeout: Duration::from_secs(1),
            ..settings()
        },
    );

    let outcome = Outcome::from_result(
        manager
            .create_service(CreateServiceRequest {
                port: 8388,
                password: "p@ss".into(),
                method: None,
                node_id: 7,
                customer_id: None,
                expires_at: None,
            })
            .await,
        "Service created",
    );
    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "invalid_reference");
    assert!(json.get("data").is_none());

    let outcome = Outcome::from_result(manager.delete_service(1).await, "Service deleted");
    assert!(!outcome.success);
    assert_eq!(outcome.code, Some("not_found"));
}

#[tokio::test]
async fn node_and_customer_commands_report_codes() {
    let db = ManagerDatabase::open_in_memory().await.unwrap();

    let outcome = Outcome::from_row_change(db.remove_node(9999).await, "Node", 9999, "removed");
    assert!(!outcome.success);
    assert_eq!(outcome.code, Some("not_found"));

    let outcome = Outcome::from_row_change(
        db.remove_customer(9999).await,
        "Customer",
        9999,
        "removed",
    );
    assert_eq!(outcome.code, Some("not_found"));

    let outcome = Outcome::from_store(
        db.create_node(&NewNode {
            name: "",
            host: "",
            port: 1080,
            username: None,
            password: None,
            region: None,
            notes: None,
        })
        .await,
        "Node created",
    );
    assert!(!outcome.success);
    assert_eq!(outcome.code, Some("invalid_input"));

    let (node_id, _) = register_node_and_customer(&db).await;
    let outcome =
        Outcome::from_row_change(db.remove_node(node_id).await, "Node", node_id, "removed");
    assert!(outcome.success);
    assert_eq!(outcome.data, Some(node_id));
}
