//! relayport Lifecycle Manager Library
//!
//! Provisions per-customer proxy endpoints as managed containers:
//! - SQLite storage for nodes, customers, and services
//! - Container engine client (Docker via `bollard`)
//! - Proxy configuration builder
//! - Lifecycle orchestration (create/delete/toggle) and status reconciliation

pub mod engine;
pub mod lifecycle;
pub mod proxy_config;
pub mod storage;
