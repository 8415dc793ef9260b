//! Steeple Storage - SQLite persistence for the relay fleet.
//!
//! The repository layer is the only writer of proxy records. All writes go
//! through the mutex-guarded [`pool::ConnectionPool`], which serializes the
//! uniqueness probes with the commits that depend on them.

pub mod database;
pub mod error;
pub mod models;
pub mod pool;
pub mod repository;
pub mod schema;

pub use database::Database;
pub use error::{Result, StorageError};
pub use models::{NewProxy, ProxyPage, StreamingProxy};
