//! Data models for storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use steeple_core::proxy::{CreateProxy, HealthStatus, ProxyStatus};

/// A relay proxy record bound to one church branch.
///
/// `current_active_streams`, `health_status`, and `last_health_check` are
/// collaborator-managed; clients never edit them directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingProxy {
    /// Opaque unique key (`px-<hex>`).
    pub id: String,
    /// Unique within a branch, case-insensitive.
    pub name: String,
    pub description: Option<String>,
    pub rtmp_url: String,
    pub rtmp_key: Option<String>,
    pub server_location: String,
    pub max_concurrent_streams: i64,
    /// Mbps.
    pub bandwidth_limit: f64,
    pub church_branch_id: String,
    pub current_active_streams: i64,
    pub status: ProxyStatus,
    pub health_status: HealthStatus,
    pub last_health_check: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for inserting a new proxy.
#[derive(Debug, Clone)]
pub struct NewProxy {
    pub name: String,
    pub description: Option<String>,
    pub rtmp_url: String,
    pub rtmp_key: Option<String>,
    pub server_location: String,
    pub max_concurrent_streams: i64,
    pub bandwidth_limit: f64,
    pub church_branch_id: String,
    pub created_by: String,
}

impl NewProxy {
    /// Build insert parameters from a validated create request.
    pub fn from_create(create: CreateProxy, created_by: impl Into<String>) -> Self {
        Self {
            name: create.name,
            description: create.description,
            rtmp_url: create.rtmp_url,
            rtmp_key: create.rtmp_key,
            server_location: create.server_location,
            max_concurrent_streams: create.max_concurrent_streams,
            bandwidth_limit: create.bandwidth_limit,
            church_branch_id: create.church_branch_id,
            created_by: created_by.into(),
        }
    }
}

/// One page of a filtered proxy listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyPage {
    pub items: Vec<StreamingProxy>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub has_more: bool,
}
