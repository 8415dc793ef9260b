//! Database connection pool.
//!
//! A mutex-guarded connection. Create/update/delete on a proxy must be
//! serialized with the uniqueness probes they depend on, and a single
//! guarded connection gives that for free: a repository call holds the
//! guard from probe to commit.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, StorageError};
use crate::schema::run_migrations;

/// Thread-safe handle to the underlying SQLite connection.
#[derive(Clone)]
pub struct ConnectionPool {
    conn: Arc<Mutex<Connection>>,
}

impl ConnectionPool {
    /// Open (or create) a file-backed database.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::setup_connection(&conn)?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (tests and ephemeral servers).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::setup_connection(&conn)?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Borrow the connection; held until the guard drops.
    pub fn get(&self) -> Result<PooledConnection<'_>> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| StorageError::Config("connection pool poisoned".to_string()))?;

        Ok(PooledConnection { guard })
    }

    fn setup_connection(conn: &Connection) -> Result<()> {
        // Referential integrity for usage samples.
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        // WAL keeps list/aggregate reads cheap while a write is in flight.
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;

        // Don't fail immediately if another process briefly holds the file.
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;

        Ok(())
    }
}

/// A connection borrowed from the pool.
pub struct PooledConnection<'a> {
    guard: MutexGuard<'a, Connection>,
}

impl std::ops::Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_pool_is_migrated() {
        let pool = ConnectionPool::in_memory().unwrap();
        let conn = pool.get().unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM proxies", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn pool_clones_share_the_connection() {
        let pool1 = ConnectionPool::in_memory().unwrap();
        let pool2 = pool1.clone();

        pool1
            .get()
            .unwrap()
            .execute(
                "INSERT INTO usage_samples (proxy_id, church_branch_id, region, category,
                     recorded_at, streams, completed_streams, viewers, bandwidth_gb, cost, errors)
                 VALUES ('px-a', 'branch-1', '', '', '2024-03-01T00:00:00+00:00', 1, 1, 10, 0.5, 2.0, 0)",
                [],
            )
            .unwrap();

        let count: i64 = pool2
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM usage_samples", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
