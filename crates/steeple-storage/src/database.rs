//! High-level database interface.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use tracing::info;

use steeple_core::metrics::{RawSample, SampleFilter, SourceError, UsageSource};
use steeple_core::proxy::{HealthStatus, ProxyFilter, ProxyPatch};

use crate::error::{Result, StorageError};
use crate::models::{NewProxy, ProxyPage, StreamingProxy};
use crate::pool::ConnectionPool;
use crate::repository::{ProxyRepo, UsageRepo};

/// High-level database interface for the relay fleet.
#[derive(Clone)]
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    /// Open the database in the default app data directory.
    pub fn new() -> Result<Self> {
        let path = Self::default_db_path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening database at: {:?}", path);
        let pool = ConnectionPool::new(&path)?;

        Ok(Self { pool })
    }

    /// Open a database at a specific path.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening database at: {:?}", path);
        let pool = ConnectionPool::new(&path)?;

        Ok(Self { pool })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let pool = ConnectionPool::in_memory()?;
        Ok(Self { pool })
    }

    /// The default database path.
    pub fn default_db_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "steeple", "steeple")
            .ok_or_else(|| StorageError::Config("Could not determine app data directory".into()))?;

        Ok(proj_dirs.data_dir().join("steeple.db"))
    }

    // === Proxies ===

    /// Create a proxy; probes both uniqueness invariants under one guard.
    pub fn create_proxy(&self, new: NewProxy) -> Result<StreamingProxy> {
        let conn = self.pool.get()?;
        ProxyRepo::insert(&conn, new)
    }

    /// Get a proxy by id.
    pub fn get_proxy(&self, id: &str) -> Result<Option<StreamingProxy>> {
        let conn = self.pool.get()?;
        ProxyRepo::get(&conn, id)
    }

    /// Merge a partial update onto a proxy.
    pub fn update_proxy(
        &self,
        id: &str,
        patch: &ProxyPatch,
        updated_by: &str,
    ) -> Result<StreamingProxy> {
        let conn = self.pool.get()?;
        ProxyRepo::update(&conn, id, patch, updated_by)
    }

    /// Soft-delete a proxy (refused while streams are active).
    pub fn delete_proxy(&self, id: &str, updated_by: &str) -> Result<StreamingProxy> {
        let conn = self.pool.get()?;
        ProxyRepo::soft_delete(&conn, id, updated_by)
    }

    /// Filtered, paginated proxy listing.
    pub fn list_proxies(&self, filter: &ProxyFilter) -> Result<ProxyPage> {
        let conn = self.pool.get()?;
        ProxyRepo::list(&conn, filter)
    }

    /// Count all proxies.
    pub fn count_proxies(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        ProxyRepo::count(&conn)
    }

    // === Collaborator hooks ===

    /// Session-system hook: set the live stream count.
    pub fn set_active_streams(&self, id: &str, count: i64) -> Result<()> {
        let conn = self.pool.get()?;
        ProxyRepo::set_active_streams(&conn, id, count)
    }

    /// Health-prober hook: record a health observation.
    pub fn record_health_check(&self, id: &str, health: HealthStatus) -> Result<()> {
        let conn = self.pool.get()?;
        ProxyRepo::record_health_check(&conn, id, health, Utc::now())
    }

    // === Usage samples ===

    /// Append a telemetry sample.
    pub fn record_sample(&self, sample: &RawSample) -> Result<i64> {
        let conn = self.pool.get()?;
        UsageRepo::insert(&conn, sample)
    }

    /// Samples inside `[start, end)` matching the filter.
    pub fn sample_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filter: &SampleFilter,
    ) -> Result<Vec<RawSample>> {
        let conn = self.pool.get()?;
        UsageRepo::sample_window(&conn, start, end, filter)
    }

    /// Drop samples recorded before `before`.
    pub fn prune_samples_before(&self, before: DateTime<Utc>) -> Result<i64> {
        let conn = self.pool.get()?;
        UsageRepo::delete_older_than(&conn, before)
    }
}

impl UsageSource for Database {
    fn sample_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filter: &SampleFilter,
    ) -> std::result::Result<Vec<RawSample>, SourceError> {
        Database::sample_window(self, start, end, filter).map_err(|e| SourceError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use steeple_core::metrics::{MetricsAggregator, MetricsQuery, ReportView};
    use steeple_core::timerange::TimeRange;

    fn new_proxy(name: &str, rtmp_url: &str) -> NewProxy {
        NewProxy {
            name: name.to_string(),
            description: None,
            rtmp_url: rtmp_url.to_string(),
            rtmp_key: None,
            server_location: "us-east".to_string(),
            max_concurrent_streams: 3,
            bandwidth_limit: 100.0,
            church_branch_id: "branch-1".to_string(),
            created_by: "system".to_string(),
        }
    }

    #[test]
    fn facade_round_trips_a_proxy() {
        let db = Database::in_memory().unwrap();

        let created = db.create_proxy(new_proxy("North", "rtmp://a/live")).unwrap();
        let fetched = db.get_proxy(&created.id).unwrap().unwrap();
        assert_eq!(fetched.name, "North");

        let deleted = db.delete_proxy(&created.id, "admin").unwrap();
        assert_eq!(deleted.status.as_str(), "inactive");
    }

    #[test]
    fn database_backs_the_aggregator() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();

        for i in 0..7 {
            db.record_sample(&RawSample {
                proxy_id: "px-1".to_string(),
                church_branch_id: "branch-1".to_string(),
                region: "us-east".to_string(),
                category: "worship".to_string(),
                recorded_at: now - Duration::days(7) + Duration::days(i) + Duration::hours(1),
                streams: 1,
                completed_streams: 1,
                viewers: 40,
                bandwidth_gb: 2.0,
                cost: 100.0,
                errors: 0,
            })
            .unwrap();
        }

        let aggregator = MetricsAggregator::new();
        let query = MetricsQuery::for_range(TimeRange::LastWeek);
        let report = aggregator
            .aggregate(&db, &query, ReportView::Detailed, now)
            .unwrap();

        assert_eq!(report.trends.len(), 7);
        assert!((report.costs.year_to_date - 700.0).abs() < 1e-6);
    }

    #[test]
    fn file_backed_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("steeple.db");

        let id = {
            let db = Database::with_path(&path).unwrap();
            db.create_proxy(new_proxy("North", "rtmp://a/live")).unwrap().id
        };

        let db = Database::with_path(&path).unwrap();
        assert!(db.get_proxy(&id).unwrap().is_some());
    }
}
