//! Proxy domain types shared by the storage and HTTP layers.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a relay proxy.
///
/// Deletes are soft: a deleted proxy is an inactive proxy. No other state is
/// reachable through the lifecycle service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyStatus {
    /// Proxy accepts new relay sessions.
    Active,
    /// Proxy is disabled or soft-deleted.
    Inactive,
}

impl ProxyStatus {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyStatus::Active => "active",
            ProxyStatus::Inactive => "inactive",
        }
    }

    /// Parse from a wire or database token (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Some(ProxyStatus::Active),
            "inactive" => Some(ProxyStatus::Inactive),
            _ => None,
        }
    }
}

/// Health of a relay proxy.
///
/// Written only by the health-check collaborator, never by client edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Error,
}

impl HealthStatus {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Error => "error",
        }
    }

    /// Parse from a wire or database token (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "healthy" => Some(HealthStatus::Healthy),
            "warning" => Some(HealthStatus::Warning),
            "error" => Some(HealthStatus::Error),
            _ => None,
        }
    }
}

/// A validated create request for a relay proxy.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateProxy {
    pub name: String,
    pub description: Option<String>,
    pub rtmp_url: String,
    pub rtmp_key: Option<String>,
    pub server_location: String,
    pub max_concurrent_streams: i64,
    pub bandwidth_limit: f64,
    pub church_branch_id: String,
}

/// A validated partial update.
///
/// Absent fields are left untouched on merge. The branch binding is
/// immutable; `current_active_streams` and health fields are owned by their
/// collaborators and cannot appear here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProxyPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub rtmp_url: Option<String>,
    pub rtmp_key: Option<String>,
    pub server_location: Option<String>,
    pub max_concurrent_streams: Option<i64>,
    pub bandwidth_limit: Option<f64>,
    pub status: Option<ProxyStatus>,
}

impl ProxyPatch {
    /// True when no field is supplied (an empty patch is a no-op merge).
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.rtmp_url.is_none()
            && self.rtmp_key.is_none()
            && self.server_location.is_none()
            && self.max_concurrent_streams.is_none()
            && self.bandwidth_limit.is_none()
            && self.status.is_none()
    }
}

/// Validated list filters with pagination defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyFilter {
    pub status: Option<ProxyStatus>,
    pub health_status: Option<HealthStatus>,
    pub church_branch_id: Option<String>,
    /// Case-insensitive substring match over name, description, rtmp_url.
    pub search: Option<String>,
    pub page: i64,
    pub limit: i64,
}

impl Default for ProxyFilter {
    fn default() -> Self {
        Self {
            status: None,
            health_status: None,
            church_branch_id: None,
            search: None,
            page: 1,
            limit: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_tokens() {
        assert_eq!(ProxyStatus::parse("active"), Some(ProxyStatus::Active));
        assert_eq!(ProxyStatus::parse("INACTIVE"), Some(ProxyStatus::Inactive));
        assert_eq!(ProxyStatus::parse("deleted"), None);
        assert_eq!(ProxyStatus::Active.as_str(), "active");
    }

    #[test]
    fn health_round_trips_through_tokens() {
        assert_eq!(HealthStatus::parse("Warning"), Some(HealthStatus::Warning));
        assert_eq!(HealthStatus::parse("ok"), None);
        assert_eq!(HealthStatus::Error.as_str(), "error");
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(ProxyPatch::default().is_empty());

        let patch = ProxyPatch {
            name: Some("Chapel Relay".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn filter_defaults_to_first_page() {
        let filter = ProxyFilter::default();
        assert_eq!(filter.page, 1);
        assert_eq!(filter.limit, 20);
        assert!(filter.status.is_none());
    }
}
