//! SQLite storage for the relayport manager.
//!
//! Durable record of relay nodes, customers, and provisioned proxy services.
//! This is the source of truth for *intent*; runtime state lives in the
//! container engine.

mod db;
mod models;
mod queries;
mod queries_services;
mod store;

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests;

pub use db::{DatabaseError, ManagerDatabase};
pub use models::*;
pub use queries::{NewCustomer, NewNode};
pub use queries_services::NewService;
pub use store::ServiceStore;
