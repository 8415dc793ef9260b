//! Usage-sample repository.
//!
//! Samples are append-only: the telemetry collaborator inserts them, the
//! metrics aggregator reads them back through `sample_window`. Nothing
//! updates a sample in place.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use steeple_core::metrics::{RawSample, SampleFilter};

use crate::error::Result;

/// Repository for raw usage samples.
pub struct UsageRepo;

impl UsageRepo {
    /// Append a sample.
    pub fn insert(conn: &Connection, sample: &RawSample) -> Result<i64> {
        conn.execute(
            "INSERT INTO usage_samples (proxy_id, church_branch_id, region, category,
                 recorded_at, streams, completed_streams, viewers, bandwidth_gb, cost, errors)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                sample.proxy_id,
                sample.church_branch_id,
                sample.region,
                sample.category,
                sample.recorded_at.to_rfc3339(),
                sample.streams,
                sample.completed_streams,
                sample.viewers,
                sample.bandwidth_gb,
                sample.cost,
                sample.errors,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Samples with `start <= recorded_at < end` matching the filter,
    /// oldest first.
    pub fn sample_window(
        conn: &Connection,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filter: &SampleFilter,
    ) -> Result<Vec<RawSample>> {
        let mut clauses = vec!["recorded_at >= ?", "recorded_at < ?"];
        let mut args: Vec<String> = vec![start.to_rfc3339(), end.to_rfc3339()];

        if let Some(proxy_id) = &filter.proxy_id {
            clauses.push("proxy_id = ?");
            args.push(proxy_id.clone());
        }
        if let Some(branch) = &filter.church_branch_id {
            clauses.push("church_branch_id = ?");
            args.push(branch.clone());
        }
        if let Some(region) = &filter.region {
            clauses.push("region = ?");
            args.push(region.clone());
        }
        if let Some(category) = &filter.category {
            clauses.push("category = ?");
            args.push(category.clone());
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT proxy_id, church_branch_id, region, category, recorded_at,
                    streams, completed_streams, viewers, bandwidth_gb, cost, errors
             FROM usage_samples WHERE {} ORDER BY recorded_at ASC",
            clauses.join(" AND ")
        ))?;

        let samples: Vec<RawSample> = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), row_to_sample)?
            .collect::<std::result::Result<_, _>>()?;

        Ok(samples)
    }

    /// Drop samples recorded before `before`; returns the number removed.
    pub fn delete_older_than(conn: &Connection, before: DateTime<Utc>) -> Result<i64> {
        let deleted = conn.execute(
            "DELETE FROM usage_samples WHERE recorded_at < ?1",
            [before.to_rfc3339()],
        )?;
        Ok(deleted as i64)
    }
}

fn row_to_sample(row: &Row<'_>) -> rusqlite::Result<RawSample> {
    Ok(RawSample {
        proxy_id: row.get(0)?,
        church_branch_id: row.get(1)?,
        region: row.get(2)?,
        category: row.get(3)?,
        recorded_at: parse_datetime(&row.get::<_, String>(4)?),
        streams: row.get(5)?,
        completed_streams: row.get(6)?,
        viewers: row.get(7)?,
        bandwidth_gb: row.get(8)?,
        cost: row.get(9)?,
        errors: row.get(10)?,
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}
