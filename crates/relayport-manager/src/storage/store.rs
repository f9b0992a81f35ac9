//! The persistence contract the lifecycle manager depends on.

use std::future::Future;

use super::db::{DatabaseError, ManagerDatabase};
use super::models::{Customer, Node, Service, ServiceRow, ServiceStatus};
use super::queries_services::NewService;

/// Store operations used by the orchestrator and the status reconciler.
///
/// Lookups of a missing row fail with [`DatabaseError::NotFound`]; a second
/// insert for an occupied port fails with [`DatabaseError::UniqueViolation`].
pub trait ServiceStore: Send + Sync {
    fn get_node(&self, id: i64) -> impl Future<Output = Result<Node, DatabaseError>> + Send;

    fn get_customer(&self, id: i64)
    -> impl Future<Output = Result<Customer, DatabaseError>> + Send;

    fn port_in_use(&self, port: u16) -> impl Future<Output = Result<bool, DatabaseError>> + Send;

    fn insert_service(
        &self,
        params: &NewService,
    ) -> impl Future<Output = Result<i64, DatabaseError>> + Send;

    fn get_service(&self, id: i64) -> impl Future<Output = Result<Service, DatabaseError>> + Send;

    fn delete_service(&self, id: i64) -> impl Future<Output = Result<bool, DatabaseError>> + Send;

    fn update_service_status(
        &self,
        id: i64,
        status: ServiceStatus,
    ) -> impl Future<Output = Result<(), DatabaseError>> + Send;

    fn list_services_joined(
        &self,
    ) -> impl Future<Output = Result<Vec<ServiceRow>, DatabaseError>> + Send;
}

impl ServiceStore for ManagerDatabase {
    fn get_node(&self, id: i64) -> impl Future<Output = Result<Node, DatabaseError>> + Send {
        Self::get_node(self, id)
    }

    fn get_customer(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Customer, DatabaseError>> + Send {
        Self::get_customer(self, id)
    }

    fn port_in_use(&self, port: u16) -> impl Future<Output = Result<bool, DatabaseError>> + Send {
        Self::port_in_use(self, port)
    }

    fn insert_service(
        &self,
        params: &NewService,
    ) -> impl Future<Output = Result<i64, DatabaseError>> + Send {
        Self::insert_service(self, params)
    }

    fn get_service(&self, id: i64) -> impl Future<Output = Result<Service, DatabaseError>> + Send {
        Self::get_service(self, id)
    }

    fn delete_service(&self, id: i64) -> impl Future<Output = Result<bool, DatabaseError>> + Send {
        Self::delete_service(self, id)
    }

    fn update_service_status(
        &self,
        id: i64,
        status: ServiceStatus,
    ) -> impl Future<Output = Result<(), DatabaseError>> + Send {
        Self::update_service_status(self, id, status)
    }

    fn list_services_joined(
        &self,
    ) -> impl Future<Output = Result<Vec<ServiceRow>, DatabaseError>> + Send {
        Self::list_services_joined(self)
    }
}
