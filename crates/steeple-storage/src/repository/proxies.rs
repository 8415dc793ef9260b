//! Proxy repository: the only writer of proxy records.
//!
//! Every mutating call runs its uniqueness probes and its commit on the same
//! pooled connection, under the same guard. Validation happened before the
//! call; nothing here writes partially.

use chrono::{DateTime, Utc};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};

use steeple_core::proxy::{HealthStatus, ProxyFilter, ProxyPatch, ProxyStatus};

use crate::error::{Result, StorageError};
use crate::models::{NewProxy, ProxyPage, StreamingProxy};

const PROXY_COLUMNS: &str = "id, name, description, rtmp_url, rtmp_key, server_location,
    max_concurrent_streams, bandwidth_limit, church_branch_id, current_active_streams,
    status, health_status, last_health_check, created_by, created_at, updated_by, updated_at";

/// Repository for proxy lifecycle operations.
pub struct ProxyRepo;

impl ProxyRepo {
    /// Insert a new proxy after probing both uniqueness invariants.
    ///
    /// On conflict the error names the proxy already holding the value.
    pub fn insert(conn: &Connection, new: NewProxy) -> Result<StreamingProxy> {
        if let Some(existing_id) =
            Self::find_name_conflict(conn, &new.church_branch_id, &new.name, None)?
        {
            return Err(StorageError::Conflict {
                field: "name",
                existing_id,
            });
        }

        let fingerprint = rtmp_fingerprint(&new.rtmp_url, new.rtmp_key.as_deref());
        if let Some(existing_id) = Self::find_rtmp_conflict(conn, &fingerprint, None)? {
            return Err(StorageError::Conflict {
                field: "rtmpUrl",
                existing_id,
            });
        }

        let id = generate_id();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO proxies (id, name, description, rtmp_url, rtmp_key, rtmp_fingerprint,
                 server_location, max_concurrent_streams, bandwidth_limit, church_branch_id,
                 current_active_streams, status, health_status,
                 created_by, created_at, updated_by, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, 'active', 'healthy',
                 ?11, ?12, ?11, ?12)",
            params![
                id,
                new.name,
                new.description,
                new.rtmp_url,
                new.rtmp_key,
                fingerprint,
                new.server_location,
                new.max_concurrent_streams,
                new.bandwidth_limit,
                new.church_branch_id,
                new.created_by,
                now,
            ],
        )?;

        Self::get(conn, &id)?.ok_or_else(|| StorageError::NotFound(format!("proxy {id}")))
    }

    /// Get a proxy by id.
    pub fn get(conn: &Connection, id: &str) -> Result<Option<StreamingProxy>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROXY_COLUMNS} FROM proxies WHERE id = ?1"
        ))?;

        let proxy = stmt.query_row([id], row_to_proxy).optional()?;
        Ok(proxy)
    }

    /// Merge a partial update onto an existing proxy.
    ///
    /// Only supplied fields change; `updated_at`/`updated_by` always bump.
    pub fn update(
        conn: &Connection,
        id: &str,
        patch: &ProxyPatch,
        updated_by: &str,
    ) -> Result<StreamingProxy> {
        let current =
            Self::get(conn, id)?.ok_or_else(|| StorageError::NotFound(format!("proxy {id}")))?;

        if let Some(name) = &patch.name {
            if !name.eq_ignore_ascii_case(&current.name) {
                if let Some(existing_id) =
                    Self::find_name_conflict(conn, &current.church_branch_id, name, Some(id))?
                {
                    return Err(StorageError::Conflict {
                        field: "name",
                        existing_id,
                    });
                }
            }
        }

        let rtmp_url = patch.rtmp_url.clone().unwrap_or_else(|| current.rtmp_url.clone());
        let rtmp_key = patch.rtmp_key.clone().or_else(|| current.rtmp_key.clone());
        let fingerprint = rtmp_fingerprint(&rtmp_url, rtmp_key.as_deref());
        if patch.rtmp_url.is_some() || patch.rtmp_key.is_some() {
            if let Some(existing_id) = Self::find_rtmp_conflict(conn, &fingerprint, Some(id))? {
                return Err(StorageError::Conflict {
                    field: "rtmpUrl",
                    existing_id,
                });
            }
        }

        let name = patch.name.clone().unwrap_or(current.name);
        // A supplied empty description clears the field.
        let description = match &patch.description {
            Some(d) if d.trim().is_empty() => None,
            Some(d) => Some(d.clone()),
            None => current.description,
        };
        let server_location = patch
            .server_location
            .clone()
            .unwrap_or(current.server_location);
        let max_concurrent_streams = patch
            .max_concurrent_streams
            .unwrap_or(current.max_concurrent_streams);
        let bandwidth_limit = patch.bandwidth_limit.unwrap_or(current.bandwidth_limit);
        let status = patch.status.unwrap_or(current.status);

        conn.execute(
            "UPDATE proxies SET name = ?1, description = ?2, rtmp_url = ?3, rtmp_key = ?4,
                 rtmp_fingerprint = ?5, server_location = ?6, max_concurrent_streams = ?7,
                 bandwidth_limit = ?8, status = ?9, updated_by = ?10, updated_at = ?11
             WHERE id = ?12",
            params![
                name,
                description,
                rtmp_url,
                rtmp_key,
                fingerprint,
                server_location,
                max_concurrent_streams,
                bandwidth_limit,
                status.as_str(),
                updated_by,
                Utc::now().to_rfc3339(),
                id,
            ],
        )?;

        Self::get(conn, id)?.ok_or_else(|| StorageError::NotFound(format!("proxy {id}")))
    }

    /// Soft-delete a proxy: degrade status to inactive, keep the record.
    ///
    /// Refused while streams are active; the caller may retry after they end.
    pub fn soft_delete(conn: &Connection, id: &str, updated_by: &str) -> Result<StreamingProxy> {
        let current =
            Self::get(conn, id)?.ok_or_else(|| StorageError::NotFound(format!("proxy {id}")))?;

        if current.current_active_streams > 0 {
            return Err(StorageError::InvalidState(format!(
                "cannot delete proxy {id} with {} active streams",
                current.current_active_streams
            )));
        }

        conn.execute(
            "UPDATE proxies SET status = 'inactive', updated_by = ?1, updated_at = ?2
             WHERE id = ?3",
            params![updated_by, Utc::now().to_rfc3339(), id],
        )?;

        Self::get(conn, id)?.ok_or_else(|| StorageError::NotFound(format!("proxy {id}")))
    }

    /// Filtered, paginated listing.
    ///
    /// Filters apply in order (status, health, branch, search), pagination
    /// last; the result is the filter intersection either way.
    pub fn list(conn: &Connection, filter: &ProxyFilter) -> Result<ProxyPage> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if let Some(status) = filter.status {
            clauses.push("status = ?");
            args.push(status.as_str().to_string());
        }
        if let Some(health) = filter.health_status {
            clauses.push("health_status = ?");
            args.push(health.as_str().to_string());
        }
        if let Some(branch) = &filter.church_branch_id {
            clauses.push("church_branch_id = ?");
            args.push(branch.clone());
        }
        if let Some(search) = &filter.search {
            clauses.push(
                "(instr(lower(name), ?) > 0
                  OR instr(lower(coalesce(description, '')), ?) > 0
                  OR instr(lower(rtmp_url), ?) > 0)",
            );
            let needle = search.to_lowercase();
            args.push(needle.clone());
            args.push(needle.clone());
            args.push(needle);
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM proxies{where_clause}"),
            rusqlite::params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        let offset = (filter.page - 1) * filter.limit;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROXY_COLUMNS} FROM proxies{where_clause}
             ORDER BY created_at DESC, id ASC LIMIT {} OFFSET {}",
            filter.limit, offset
        ))?;

        let items: Vec<StreamingProxy> = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), row_to_proxy)?
            .collect::<std::result::Result<_, _>>()?;

        Ok(ProxyPage {
            has_more: filter.page * filter.limit < total,
            items,
            total,
            page: filter.page,
            page_size: filter.limit,
        })
    }

    /// Session-system hook: set the live stream count for a proxy.
    ///
    /// The count may never exceed `max_concurrent_streams`.
    pub fn set_active_streams(conn: &Connection, id: &str, count: i64) -> Result<()> {
        if count < 0 {
            return Err(StorageError::InvalidState(
                "active stream count cannot be negative".to_string(),
            ));
        }

        let current =
            Self::get(conn, id)?.ok_or_else(|| StorageError::NotFound(format!("proxy {id}")))?;
        if count > current.max_concurrent_streams {
            return Err(StorageError::InvalidState(format!(
                "active streams {count} would exceed limit {}",
                current.max_concurrent_streams
            )));
        }

        conn.execute(
            "UPDATE proxies SET current_active_streams = ?1 WHERE id = ?2",
            params![count, id],
        )?;
        Ok(())
    }

    /// Health-prober hook: record a health observation.
    ///
    /// Moves only `health_status` and `last_health_check`.
    pub fn record_health_check(
        conn: &Connection,
        id: &str,
        health: HealthStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        let updated = conn.execute(
            "UPDATE proxies SET health_status = ?1, last_health_check = ?2 WHERE id = ?3",
            params![health.as_str(), checked_at.to_rfc3339(), id],
        )?;

        if updated == 0 {
            return Err(StorageError::NotFound(format!("proxy {id}")));
        }
        Ok(())
    }

    /// Count all proxies.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM proxies", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Id of the proxy holding this name in the branch (case-insensitive),
    /// if any, excluding `exclude`.
    pub fn find_name_conflict(
        conn: &Connection,
        church_branch_id: &str,
        name: &str,
        exclude: Option<&str>,
    ) -> Result<Option<String>> {
        let mut stmt = conn.prepare(
            "SELECT id FROM proxies
             WHERE church_branch_id = ?1 AND lower(name) = lower(?2)
               AND (?3 IS NULL OR id <> ?3)
             LIMIT 1",
        )?;

        let id = stmt
            .query_row(params![church_branch_id, name, exclude], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    /// Id of the proxy holding this RTMP destination, if any, excluding
    /// `exclude`.
    pub fn find_rtmp_conflict(
        conn: &Connection,
        fingerprint: &str,
        exclude: Option<&str>,
    ) -> Result<Option<String>> {
        let mut stmt = conn.prepare(
            "SELECT id FROM proxies
             WHERE rtmp_fingerprint = ?1 AND (?2 IS NULL OR id <> ?2)
             LIMIT 1",
        )?;

        let id = stmt
            .query_row(params![fingerprint, exclude], |row| row.get(0))
            .optional()?;
        Ok(id)
    }
}

/// Stable fingerprint of an RTMP destination (url + key).
pub fn rtmp_fingerprint(url: &str, key: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(key.unwrap_or("").as_bytes());
    format!("{:x}", hasher.finalize())
}

fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    let token: String = (0..8).map(|_| format!("{:02x}", rng.gen::<u8>())).collect();
    format!("px-{token}")
}

fn row_to_proxy(row: &Row<'_>) -> rusqlite::Result<StreamingProxy> {
    let status: String = row.get(10)?;
    let health: String = row.get(11)?;

    Ok(StreamingProxy {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        rtmp_url: row.get(3)?,
        rtmp_key: row.get(4)?,
        server_location: row.get(5)?,
        max_concurrent_streams: row.get(6)?,
        bandwidth_limit: row.get(7)?,
        church_branch_id: row.get(8)?,
        current_active_streams: row.get(9)?,
        status: ProxyStatus::parse(&status).unwrap_or(ProxyStatus::Inactive),
        health_status: HealthStatus::parse(&health).unwrap_or(HealthStatus::Warning),
        last_health_check: row
            .get::<_, Option<String>>(12)?
            .map(|s| parse_datetime(&s)),
        created_by: row.get(13)?,
        created_at: parse_datetime(&row.get::<_, String>(14)?),
        updated_by: row.get(15)?,
        updated_at: parse_datetime(&row.get::<_, String>(16)?),
    })
}

/// Parse a datetime from its stored SQLite representation.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::run_migrations;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn new_proxy(name: &str, rtmp_url: &str, branch: &str) -> NewProxy {
        NewProxy {
            name: name.to_string(),
            description: None,
            rtmp_url: rtmp_url.to_string(),
            rtmp_key: Some("k1".to_string()),
            server_location: "us-east".to_string(),
            max_concurrent_streams: 3,
            bandwidth_limit: 100.0,
            church_branch_id: branch.to_string(),
            created_by: "system".to_string(),
        }
    }

    #[test]
    fn insert_applies_the_managed_defaults() {
        let conn = setup_db();

        let proxy =
            ProxyRepo::insert(&conn, new_proxy("Main Campus RTMP", "rtmp://a/live", "branch-1"))
                .unwrap();

        assert!(proxy.id.starts_with("px-"));
        assert_eq!(proxy.status, ProxyStatus::Active);
        assert_eq!(proxy.health_status, HealthStatus::Healthy);
        assert_eq!(proxy.current_active_streams, 0);
        assert_eq!(proxy.created_by, "system");
        assert!(proxy.last_health_check.is_none());
    }

    #[test]
    fn duplicate_name_in_branch_conflicts_case_insensitively() {
        let conn = setup_db();

        let first =
            ProxyRepo::insert(&conn, new_proxy("Main Campus", "rtmp://a/live", "branch-1"))
                .unwrap();

        let mut second = new_proxy("MAIN CAMPUS", "rtmp://b/live", "branch-1");
        second.rtmp_key = Some("k2".to_string());
        let err = ProxyRepo::insert(&conn, second).unwrap_err();

        match err {
            StorageError::Conflict { field, existing_id } => {
                assert_eq!(field, "name");
                assert_eq!(existing_id, first.id);
            }
            other => panic!("expected name conflict, got {other}"),
        }
    }

    #[test]
    fn same_name_in_another_branch_is_fine() {
        let conn = setup_db();

        ProxyRepo::insert(&conn, new_proxy("Main Campus", "rtmp://a/live", "branch-1")).unwrap();
        let mut other = new_proxy("Main Campus", "rtmp://b/live", "branch-2");
        other.rtmp_key = Some("k2".to_string());
        assert!(ProxyRepo::insert(&conn, other).is_ok());
    }

    #[test]
    fn duplicate_rtmp_destination_conflicts_across_branches() {
        let conn = setup_db();

        let first =
            ProxyRepo::insert(&conn, new_proxy("North", "rtmp://a/live", "branch-1")).unwrap();

        // Same url and key, different branch and name.
        let err =
            ProxyRepo::insert(&conn, new_proxy("South", "rtmp://a/live", "branch-2")).unwrap_err();
        match err {
            StorageError::Conflict { field, existing_id } => {
                assert_eq!(field, "rtmpUrl");
                assert_eq!(existing_id, first.id);
            }
            other => panic!("expected rtmp conflict, got {other}"),
        }
    }

    #[test]
    fn same_url_with_different_key_is_a_different_destination() {
        let conn = setup_db();

        ProxyRepo::insert(&conn, new_proxy("North", "rtmp://a/live", "branch-1")).unwrap();
        let mut other = new_proxy("South", "rtmp://a/live", "branch-2");
        other.rtmp_key = Some("k2".to_string());
        assert!(ProxyRepo::insert(&conn, other).is_ok());
    }

    #[test]
    fn update_merges_only_supplied_fields() {
        let conn = setup_db();

        let proxy = ProxyRepo::insert(&conn, new_proxy("North", "rtmp://a/live", "branch-1")).unwrap();

        let patch = ProxyPatch {
            bandwidth_limit: Some(250.0),
            ..Default::default()
        };
        let updated = ProxyRepo::update(&conn, &proxy.id, &patch, "admin").unwrap();

        assert_eq!(updated.bandwidth_limit, 250.0);
        assert_eq!(updated.name, "North");
        assert_eq!(updated.rtmp_url, "rtmp://a/live");
        assert_eq!(updated.updated_by, "admin");
    }

    #[test]
    fn empty_patch_changes_nothing_but_audit_fields() {
        let conn = setup_db();

        let proxy = ProxyRepo::insert(&conn, new_proxy("North", "rtmp://a/live", "branch-1")).unwrap();
        let updated =
            ProxyRepo::update(&conn, &proxy.id, &ProxyPatch::default(), "admin").unwrap();

        assert_eq!(updated.name, proxy.name);
        assert_eq!(updated.description, proxy.description);
        assert_eq!(updated.rtmp_url, proxy.rtmp_url);
        assert_eq!(updated.rtmp_key, proxy.rtmp_key);
        assert_eq!(updated.server_location, proxy.server_location);
        assert_eq!(updated.max_concurrent_streams, proxy.max_concurrent_streams);
        assert_eq!(updated.bandwidth_limit, proxy.bandwidth_limit);
        assert_eq!(updated.status, proxy.status);
        assert_eq!(updated.current_active_streams, proxy.current_active_streams);
    }

    #[test]
    fn rename_onto_a_sibling_conflicts() {
        let conn = setup_db();

        let first = ProxyRepo::insert(&conn, new_proxy("North", "rtmp://a/live", "branch-1")).unwrap();
        let mut second_new = new_proxy("South", "rtmp://b/live", "branch-1");
        second_new.rtmp_key = Some("k2".to_string());
        let second = ProxyRepo::insert(&conn, second_new).unwrap();

        let patch = ProxyPatch {
            name: Some("north".to_string()),
            ..Default::default()
        };
        let err = ProxyRepo::update(&conn, &second.id, &patch, "admin").unwrap_err();
        match err {
            StorageError::Conflict { field, existing_id } => {
                assert_eq!(field, "name");
                assert_eq!(existing_id, first.id);
            }
            other => panic!("expected name conflict, got {other}"),
        }
    }

    #[test]
    fn changing_case_of_own_name_is_not_a_conflict() {
        let conn = setup_db();

        let proxy = ProxyRepo::insert(&conn, new_proxy("North", "rtmp://a/live", "branch-1")).unwrap();
        let patch = ProxyPatch {
            name: Some("NORTH".to_string()),
            ..Default::default()
        };
        let updated = ProxyRepo::update(&conn, &proxy.id, &patch, "admin").unwrap();
        assert_eq!(updated.name, "NORTH");
    }

    #[test]
    fn moving_rtmp_onto_a_sibling_conflicts() {
        let conn = setup_db();

        ProxyRepo::insert(&conn, new_proxy("North", "rtmp://a/live", "branch-1")).unwrap();
        let mut second_new = new_proxy("South", "rtmp://b/live", "branch-1");
        second_new.rtmp_key = Some("k1".to_string());
        let second = ProxyRepo::insert(&conn, second_new).unwrap();

        let patch = ProxyPatch {
            rtmp_url: Some("rtmp://a/live".to_string()),
            ..Default::default()
        };
        let err = ProxyRepo::update(&conn, &second.id, &patch, "admin").unwrap_err();
        assert!(matches!(err, StorageError::Conflict { field: "rtmpUrl", .. }));
    }

    #[test]
    fn delete_with_active_streams_is_refused_and_status_unchanged() {
        let conn = setup_db();

        let proxy = ProxyRepo::insert(&conn, new_proxy("North", "rtmp://a/live", "branch-1")).unwrap();
        ProxyRepo::set_active_streams(&conn, &proxy.id, 1).unwrap();

        let err = ProxyRepo::soft_delete(&conn, &proxy.id, "admin").unwrap_err();
        assert!(matches!(err, StorageError::InvalidState(_)));

        let unchanged = ProxyRepo::get(&conn, &proxy.id).unwrap().unwrap();
        assert_eq!(unchanged.status, ProxyStatus::Active);
    }

    #[test]
    fn delete_soft_deletes_and_keeps_the_record_queryable() {
        let conn = setup_db();

        let proxy = ProxyRepo::insert(&conn, new_proxy("North", "rtmp://a/live", "branch-1")).unwrap();
        let deleted = ProxyRepo::soft_delete(&conn, &proxy.id, "admin").unwrap();

        assert_eq!(deleted.status, ProxyStatus::Inactive);
        assert!(ProxyRepo::get(&conn, &proxy.id).unwrap().is_some());
        assert_eq!(ProxyRepo::count(&conn).unwrap(), 1);
    }

    #[test]
    fn set_active_streams_enforces_the_limit() {
        let conn = setup_db();

        let proxy = ProxyRepo::insert(&conn, new_proxy("North", "rtmp://a/live", "branch-1")).unwrap();

        ProxyRepo::set_active_streams(&conn, &proxy.id, 3).unwrap();
        assert!(ProxyRepo::set_active_streams(&conn, &proxy.id, 4).is_err());
        assert!(ProxyRepo::set_active_streams(&conn, &proxy.id, -1).is_err());
    }

    #[test]
    fn record_health_check_moves_only_health_fields() {
        let conn = setup_db();

        let proxy = ProxyRepo::insert(&conn, new_proxy("North", "rtmp://a/live", "branch-1")).unwrap();
        ProxyRepo::record_health_check(&conn, &proxy.id, HealthStatus::Warning, Utc::now()).unwrap();

        let checked = ProxyRepo::get(&conn, &proxy.id).unwrap().unwrap();
        assert_eq!(checked.health_status, HealthStatus::Warning);
        assert!(checked.last_health_check.is_some());
        assert_eq!(checked.status, ProxyStatus::Active);
        assert_eq!(checked.updated_at, proxy.updated_at);
    }

    #[test]
    fn list_filters_then_paginates() {
        let conn = setup_db();

        for i in 0..3 {
            let mut new = new_proxy(&format!("Relay {i}"), &format!("rtmp://host{i}/live"), "branch-1");
            new.rtmp_key = Some(format!("k{i}"));
            ProxyRepo::insert(&conn, new).unwrap();
        }
        let mut other = new_proxy("Other Branch", "rtmp://other/live", "branch-2");
        other.rtmp_key = Some("ko".to_string());
        let other = ProxyRepo::insert(&conn, other).unwrap();
        ProxyRepo::soft_delete(&conn, &other.id, "system").unwrap();

        let page = ProxyRepo::list(
            &conn,
            &ProxyFilter {
                status: Some(ProxyStatus::Active),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 3);
        assert!(!page.has_more);

        let paged = ProxyRepo::list(
            &conn,
            &ProxyFilter {
                status: Some(ProxyStatus::Active),
                page: 1,
                limit: 2,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(paged.items.len(), 2);
        assert!(paged.has_more);
    }

    #[test]
    fn pagination_covers_the_filtered_set_exactly() {
        let conn = setup_db();

        for i in 0..5 {
            let mut new = new_proxy(&format!("Relay {i}"), &format!("rtmp://host{i}/live"), "branch-1");
            new.rtmp_key = Some(format!("k{i}"));
            ProxyRepo::insert(&conn, new).unwrap();
        }

        let mut seen = std::collections::HashSet::new();
        let mut page = 1;
        loop {
            let result = ProxyRepo::list(
                &conn,
                &ProxyFilter {
                    page,
                    limit: 2,
                    ..Default::default()
                },
            )
            .unwrap();
            for item in &result.items {
                assert!(seen.insert(item.id.clone()), "duplicate across pages");
            }
            if !result.has_more {
                break;
            }
            page += 1;
        }
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn search_matches_name_description_and_url() {
        let conn = setup_db();

        let mut a = new_proxy("Sanctuary Relay", "rtmp://east.example.org/live", "branch-1");
        a.description = Some("primary feed".to_string());
        ProxyRepo::insert(&conn, a).unwrap();

        let mut b = new_proxy("Youth Hall", "rtmp://west.example.org/live", "branch-1");
        b.rtmp_key = Some("k2".to_string());
        ProxyRepo::insert(&conn, b).unwrap();

        let by_name = ProxyRepo::list(
            &conn,
            &ProxyFilter {
                search: Some("SANCTUARY".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_name.total, 1);

        let by_description = ProxyRepo::list(
            &conn,
            &ProxyFilter {
                search: Some("primary".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_description.total, 1);

        let by_url = ProxyRepo::list(
            &conn,
            &ProxyFilter {
                search: Some("west.example".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_url.total, 1);
        assert_eq!(by_url.items[0].name, "Youth Hall");
    }

    #[test]
    fn fingerprint_distinguishes_url_key_pairs() {
        let a = rtmp_fingerprint("rtmp://a/live", Some("k1"));
        let b = rtmp_fingerprint("rtmp://a/live", Some("k2"));
        let c = rtmp_fingerprint("rtmp://a/live", None);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, rtmp_fingerprint("rtmp://a/live", Some("k1")));
    }
}
