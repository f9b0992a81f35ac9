//! SQLite database for the relayport manager.

pub use relayport_core::db::DatabaseError;

relayport_core::define_database!(ManagerDatabase, "Manager database migrations complete");
