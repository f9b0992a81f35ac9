//! Storage layer tests for the relayport manager.

use super::db::{DatabaseError, ManagerDatabase};
use super::models::ServiceStatus;
use super::queries::{NewCustomer, NewNode};
use super::queries_services::NewService;

async fn test_db() -> ManagerDatabase {
    ManagerDatabase::open_in_memory().await.unwrap()
}

fn node_params<'a>(name: &'a str) -> NewNode<'a> {
    NewNode {
        name,
        host: "203.0.113.5",
        port: 1080,
        username: None,
        password: None,
        region: Some("eu"),
        notes: None,
    }
}

fn service_params(port: u16, node_id: i64) -> NewService {
    NewService {
        port,
        password: "p@ss".into(),
        method: "aes-256-gcm".into(),
        node_id,
        customer_id: None,
        container_id: format!("c-{port}"),
        status: ServiceStatus::Running,
        expires_at: None,
    }
}

// === Node tests ===

#[tokio::test]
async fn create_and_get_node() {
    let db = test_db().await;
    let node = db.create_node(&node_params("edge-1")).await.unwrap();

    assert_eq!(node.name, "edge-1");
    assert_eq!(node.host, "203.0.113.5");
    assert_eq!(node.port, 1080);
    assert_eq!(node.status, "active");
    assert!(node.is_active());
    assert!(node.credential().is_none());

    let fetched = db.get_node(node.id).await.unwrap();
    assert_eq!(fetched.id, node.id);
}

#[tokio::test]
async fn node_credential_requires_both_halves() {
    let db = test_db().await;
    let node = db
        .create_node(&NewNode {
            username: Some("relay"),
            password: Some("secret"),
            ..node_params("edge-auth")
        })
        .await
        .unwrap();
    assert_eq!(node.credential(), Some(("relay", "secret")));

    let half = db
        .create_node(&NewNode {
            username: Some("relay"),
            ..node_params("edge-half")
        })
        .await
        .unwrap();
    assert!(half.credential().is_none());
}

#[tokio::test]
async fn missing_node_is_not_found() {
    let db = test_db().await;
    assert!(matches!(
        db.get_node(42).await,
        Err(DatabaseError::NotFound(_))
    ));
}

#[tokio::test]
async fn update_and_remove_node() {
    let db = test_db().await;
    let node = db.create_node(&node_params("edge-1")).await.unwrap();

    assert!(db.update_node_status(node.id, "disabled").await.unwrap());
    assert!(!db.get_node(node.id).await.unwrap().is_active());

    assert!(db.remove_node(node.id).await.unwrap());
    assert!(!db.remove_node(node.id).await.unwrap());
    assert!(db.list_nodes().await.unwrap().is_empty());
}

#[tokio::test]
async fn blank_node_name_or_host_is_rejected() {
    let db = test_db().await;

    let err = db.create_node(&node_params("")).await.unwrap_err();
    assert!(matches!(err, DatabaseError::Invalid(_)));

    let err = db
        .create_node(&NewNode {
            host: " ",
            ..node_params("edge-1")
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Invalid(_)));

    let err = db
        .create_node(&NewNode {
            port: 0,
            ..node_params("edge-1")
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Invalid(_)));

    assert!(db.list_nodes().await.unwrap().is_empty());
}

// === Customer tests ===

#[tokio::test]
async fn create_and_list_customers() {
    let db = test_db().await;
    db.create_customer(&NewCustomer {
        name: "alice",
        contact_id: Some("wx-alice"),
        phone: None,
        email: Some("alice@example.com"),
        notes: None,
    })
    .await
    .unwrap();
    db.create_customer(&NewCustomer {
        name: "bob",
        contact_id: None,
        phone: None,
        email: None,
        notes: Some("trial"),
    })
    .await
    .unwrap();

    let customers = db.list_customers().await.unwrap();
    assert_eq!(customers.len(), 2);
    assert_eq!(customers[0].name, "bob");
    assert_eq!(customers[1].status, "active");
}

#[tokio::test]
async fn blank_customer_name_is_rejected() {
    let db = test_db().await;

    let err = db
        .create_customer(&NewCustomer {
            name: "  ",
            contact_id: Some("@alice"),
            phone: None,
            email: None,
            notes: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DatabaseError::Invalid(_)));
    assert!(db.list_customers().await.unwrap().is_empty());
}

// === Service tests ===

#[tokio::test]
async fn insert_and_get_service() {
    let db = test_db().await;
    let node = db.create_node(&node_params("edge-1")).await.unwrap();

    let id = db
        .insert_service(&service_params(8388, node.id))
        .await
        .unwrap();
    let service = db.get_service(id).await.unwrap();

    assert_eq!(service.port, 8388);
    assert_eq!(service.method, "aes-256-gcm");
    assert_eq!(service.node_id, Some(node.id));
    assert_eq!(service.container_id.as_deref(), Some("c-8388"));
    assert_eq!(service.status, "running");
    assert!(db.port_in_use(8388).await.unwrap());
    assert!(!db.port_in_use(8389).await.unwrap());
}

#[tokio::test]
async fn duplicate_port_is_unique_violation() {
    let db = test_db().await;
    let node = db.create_node(&node_params("edge-1")).await.unwrap();

    db.insert_service(&service_params(8388, node.id))
        .await
        .unwrap();
    let err = db
        .insert_service(&service_params(8388, node.id))
        .await
        .unwrap_err();

    assert!(matches!(err, DatabaseError::UniqueViolation(_)));
}

#[tokio::test]
async fn update_service_status_on_missing_row_is_not_found() {
    let db = test_db().await;
    let err = db
        .update_service_status(9999, ServiceStatus::Stopped)
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::NotFound(_)));
}

#[tokio::test]
async fn update_and_delete_service() {
    let db = test_db().await;
    let node = db.create_node(&node_params("edge-1")).await.unwrap();
    let id = db
        .insert_service(&service_params(8388, node.id))
        .await
        .unwrap();

    db.update_service_status(id, ServiceStatus::Stopped)
        .await
        .unwrap();
    assert_eq!(db.get_service(id).await.unwrap().status, "stopped");

    assert!(db.delete_service(id).await.unwrap());
    assert!(!db.delete_service(id).await.unwrap());
    assert!(!db.port_in_use(8388).await.unwrap());
}

#[tokio::test]
async fn list_joined_carries_labels_and_survives_dangling_refs() {
    let db = test_db().await;
    let node = db.create_node(&node_params("edge-1")).await.unwrap();
    let customer = db
        .create_customer(&NewCustomer {
            name: "alice",
            contact_id: None,
            phone: None,
            email: None,
            notes: None,
        })
        .await
        .unwrap();

    db.insert_service(&NewService {
        customer_id: Some(customer.id),
        ..service_params(8388, node.id)
    })
    .await
    .unwrap();

    let rows = db.list_services_joined().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].node_name.as_deref(), Some("edge-1"));
    assert_eq!(rows[0].node_host.as_deref(), Some("203.0.113.5"));
    assert_eq!(rows[0].customer_name.as_deref(), Some("alice"));

    // Removing the node leaves the service in place with a null reference.
    db.remove_node(node.id).await.unwrap();
    let rows = db.list_services_joined().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].node_id, None);
    assert_eq!(rows[0].node_name, None);
}

#[tokio::test]
async fn list_joined_is_newest_first() {
    let db = test_db().await;
    let node = db.create_node(&node_params("edge-1")).await.unwrap();
    for port in [8388, 8389, 8390] {
        db.insert_service(&service_params(port, node.id))
            .await
            .unwrap();
    }

    let ports: Vec<i64> = db
        .list_services_joined()
        .await
        .unwrap()
        .iter()
        .map(|r| r.port)
        .collect();
    assert_eq!(ports, vec![8390, 8389, 8388]);
}
