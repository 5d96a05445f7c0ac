//! SQLite-backed versioned cache stores.
//!
//! Each [`CacheVersion`] owns one named store of request → response
//! entries. Stores are created on install (or lazily on first write) and
//! dropped as a whole when a newer version activates or the host clears
//! the cache. Access is async via tokio-rusqlite:
//!
//! - Request keys hashed with SHA-256 for the primary key
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Entries cascade-deleted with their store

pub mod connection;
pub mod key;
pub mod migrations;
pub mod response;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use key::RequestKey;
pub use response::{HttpResponse, StoredResponse};
pub use store::{CacheStore, CacheVersion, WriteGate};
