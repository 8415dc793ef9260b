//! Database schema and migrations.

use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version < SCHEMA_VERSION {
        info!(
            "Running migrations from version {} to {}",
            current_version, SCHEMA_VERSION
        );

        if current_version < 1 {
            migrate_v1(conn)?;
        }

        if current_version < 2 {
            migrate_v2(conn)?;
        }

        set_schema_version(conn, SCHEMA_VERSION)?;
        info!("Migrations complete");
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration to version 1: proxy fleet table.
fn migrate_v1(conn: &Connection) -> Result<()> {
    info!("Applying migration v1: Proxy fleet");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS proxies (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            rtmp_url TEXT NOT NULL,
            rtmp_key TEXT,
            rtmp_fingerprint TEXT NOT NULL,
            server_location TEXT NOT NULL DEFAULT '',
            max_concurrent_streams INTEGER NOT NULL,
            bandwidth_limit REAL NOT NULL,
            church_branch_id TEXT NOT NULL,
            current_active_streams INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'active',
            health_status TEXT NOT NULL DEFAULT 'healthy',
            last_health_check TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_by TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // One relay name per branch, case-insensitive.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_proxies_branch_name
         ON proxies (church_branch_id, lower(name))",
        [],
    )?;

    // One config per RTMP destination, fleet-wide.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_proxies_rtmp_fingerprint
         ON proxies (rtmp_fingerprint)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_proxies_status ON proxies (status)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_proxies_branch ON proxies (church_branch_id)",
        [],
    )?;

    Ok(())
}

/// Migration to version 2: raw usage samples for analytics.
fn migrate_v2(conn: &Connection) -> Result<()> {
    info!("Applying migration v2: Usage samples");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS usage_samples (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            proxy_id TEXT NOT NULL,
            church_branch_id TEXT NOT NULL,
            region TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL DEFAULT '',
            recorded_at TEXT NOT NULL,
            streams INTEGER NOT NULL DEFAULT 0,
            completed_streams INTEGER NOT NULL DEFAULT 0,
            viewers INTEGER NOT NULL DEFAULT 0,
            bandwidth_gb REAL NOT NULL DEFAULT 0,
            cost REAL NOT NULL DEFAULT 0,
            errors INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // Window queries scan by time first.
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_usage_samples_recorded_at
         ON usage_samples (recorded_at)",
        [],
    )?;

    // Per-proxy bandwidth series.
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_usage_samples_proxy
         ON usage_samples (proxy_id, recorded_at)",
        [],
    )?;

    Ok(())
}
