//! Request validation.
//!
//! Raw wire payloads come in, strongly-typed values or a field-level
//! diagnostic map go out. Validation is pure: no storage access, no side
//! effects. Uniqueness probes happen later, inside the repository.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::metrics::{MetricsQuery, RangeSpec};
use crate::proxy::{CreateProxy, HealthStatus, ProxyFilter, ProxyPatch, ProxyStatus};
use crate::timerange::{TimeRange, Window};

/// Largest page size a list request may ask for.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Validation failure carrying one diagnostic per offending field.
#[derive(Debug, Clone, Error)]
#[error("validation failed: {}", summarize(.fields))]
pub struct ValidationError {
    pub fields: BTreeMap<String, String>,
}

impl ValidationError {
    /// A failure on a single field.
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), message.into());
        Self { fields }
    }
}

fn summarize(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Collects per-field diagnostics during a validation pass.
#[derive(Debug, Default)]
struct Diagnostics {
    fields: BTreeMap<String, String>,
}

impl Diagnostics {
    fn reject(&mut self, field: &str, message: impl Into<String>) {
        self.fields.insert(field.to_string(), message.into());
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.fields.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                fields: self.fields,
            })
        }
    }
}

/// Raw create/update payload as received on the wire.
///
/// Every field is optional here; `validate_create` and `validate_update`
/// decide what must be present. Managed fields (`currentActiveStreams`,
/// health) have no slot and cannot be smuggled in.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawProxyInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub rtmp_url: Option<String>,
    pub rtmp_key: Option<String>,
    pub server_location: Option<String>,
    pub max_concurrent_streams: Option<i64>,
    pub bandwidth_limit: Option<f64>,
    pub church_branch_id: Option<String>,
    pub status: Option<String>,
}

/// Raw list query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawListQuery {
    pub status: Option<String>,
    pub health_status: Option<String>,
    pub church_branch_id: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Raw analytics query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawMetricsQuery {
    pub time_range: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub category: Option<String>,
    pub region: Option<String>,
    pub church_branch_id: Option<String>,
    pub forecasting: Option<bool>,
}

fn rtmp_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // rtmp://host[:port][/app[/stream]]
        Regex::new(r"^rtmps?://[A-Za-z0-9][A-Za-z0-9.-]*(:\d{1,5})?(/\S*)?$")
            .unwrap_or_else(|e| panic!("rtmp url pattern failed to compile: {e}"))
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Validate a create payload into a [`CreateProxy`].
pub fn validate_create(raw: RawProxyInput) -> Result<CreateProxy, ValidationError> {
    let mut diag = Diagnostics::default();

    let name = non_empty(raw.name);
    if name.is_none() {
        diag.reject("name", "is required and must not be empty");
    }

    let rtmp_url = non_empty(raw.rtmp_url);
    match &rtmp_url {
        None => diag.reject("rtmpUrl", "is required"),
        Some(url) if !rtmp_url_pattern().is_match(url) => {
            diag.reject("rtmpUrl", "must be a well-formed rtmp:// or rtmps:// URL");
        }
        Some(_) => {}
    }

    let max_concurrent_streams = raw.max_concurrent_streams;
    match max_concurrent_streams {
        None => diag.reject("maxConcurrentStreams", "is required"),
        Some(n) if n < 1 => diag.reject("maxConcurrentStreams", "must be a positive integer"),
        Some(_) => {}
    }

    let bandwidth_limit = raw.bandwidth_limit;
    match bandwidth_limit {
        None => diag.reject("bandwidthLimit", "is required"),
        Some(mbps) if !mbps.is_finite() || mbps <= 0.0 => {
            diag.reject("bandwidthLimit", "must be a positive number of Mbps");
        }
        Some(_) => {}
    }

    let church_branch_id = non_empty(raw.church_branch_id);
    if church_branch_id.is_none() {
        diag.reject("churchBranchId", "is required and must not be empty");
    }

    diag.finish()?;

    // Rejections above guarantee the required fields are present.
    Ok(CreateProxy {
        name: name.unwrap_or_default(),
        description: non_empty(raw.description),
        rtmp_url: rtmp_url.unwrap_or_default(),
        rtmp_key: non_empty(raw.rtmp_key),
        server_location: non_empty(raw.server_location).unwrap_or_default(),
        max_concurrent_streams: max_concurrent_streams.unwrap_or_default(),
        bandwidth_limit: bandwidth_limit.unwrap_or_default(),
        church_branch_id: church_branch_id.unwrap_or_default(),
    })
}

/// Validate an update payload into a [`ProxyPatch`].
///
/// Only supplied fields are checked; everything else stays untouched on
/// merge. An empty patch is valid (and a no-op apart from `updatedAt`).
pub fn validate_update(raw: RawProxyInput) -> Result<ProxyPatch, ValidationError> {
    let mut diag = Diagnostics::default();

    if let Some(name) = &raw.name {
        if name.trim().is_empty() {
            diag.reject("name", "must not be empty");
        }
    }

    if let Some(url) = &raw.rtmp_url {
        if !rtmp_url_pattern().is_match(url.trim()) {
            diag.reject("rtmpUrl", "must be a well-formed rtmp:// or rtmps:// URL");
        }
    }

    if let Some(n) = raw.max_concurrent_streams {
        if n < 1 {
            diag.reject("maxConcurrentStreams", "must be a positive integer");
        }
    }

    if let Some(mbps) = raw.bandwidth_limit {
        if !mbps.is_finite() || mbps <= 0.0 {
            diag.reject("bandwidthLimit", "must be a positive number of Mbps");
        }
    }

    if raw.church_branch_id.is_some() {
        diag.reject("churchBranchId", "cannot be changed after creation");
    }

    let status = match &raw.status {
        None => None,
        Some(token) => match ProxyStatus::parse(token) {
            Some(status) => Some(status),
            None => {
                diag.reject("status", "must be one of: active, inactive");
                None
            }
        },
    };

    diag.finish()?;

    Ok(ProxyPatch {
        name: raw.name.map(|s| s.trim().to_string()),
        description: raw.description,
        rtmp_url: raw.rtmp_url.map(|s| s.trim().to_string()),
        rtmp_key: non_empty(raw.rtmp_key),
        server_location: raw.server_location,
        max_concurrent_streams: raw.max_concurrent_streams,
        bandwidth_limit: raw.bandwidth_limit,
        status,
    })
}

/// Validate list filters, applying pagination defaults.
pub fn validate_filters(raw: RawListQuery) -> Result<ProxyFilter, ValidationError> {
    let mut diag = Diagnostics::default();

    let status = match &raw.status {
        None => None,
        Some(token) => match ProxyStatus::parse(token) {
            Some(status) => Some(status),
            None => {
                diag.reject("status", "must be one of: active, inactive");
                None
            }
        },
    };

    let health_status = match &raw.health_status {
        None => None,
        Some(token) => match HealthStatus::parse(token) {
            Some(health) => Some(health),
            None => {
                diag.reject("healthStatus", "must be one of: healthy, warning, error");
                None
            }
        },
    };

    let page = raw.page.unwrap_or(1);
    if page < 1 {
        diag.reject("page", "must be at least 1");
    }

    let limit = raw.limit.unwrap_or(20);
    if limit < 1 {
        diag.reject("limit", "must be at least 1");
    } else if limit > MAX_PAGE_SIZE {
        diag.reject("limit", format!("must be at most {MAX_PAGE_SIZE}"));
    }

    diag.finish()?;

    Ok(ProxyFilter {
        status,
        health_status,
        church_branch_id: non_empty(raw.church_branch_id),
        search: non_empty(raw.search),
        page,
        limit,
    })
}

/// Validate an analytics query.
///
/// An explicit `startDate`/`endDate` pair wins over the `timeRange` token;
/// with neither present the endpoint's `default_range` applies.
pub fn validate_metrics_query(
    raw: RawMetricsQuery,
    default_range: TimeRange,
) -> Result<MetricsQuery, ValidationError> {
    let mut diag = Diagnostics::default();

    let range = if raw.start_date.is_some() || raw.end_date.is_some() {
        let start = parse_boundary(&mut diag, "startDate", raw.start_date.as_deref());
        let end = parse_boundary(&mut diag, "endDate", raw.end_date.as_deref());
        match (start, end) {
            (Some(start), Some(end)) if start >= end => {
                diag.reject("startDate", "must be strictly before endDate");
                None
            }
            (Some(start), Some(end)) => Some(RangeSpec::Custom(Window { start, end })),
            _ => None,
        }
    } else {
        match &raw.time_range {
            None => Some(RangeSpec::Token(default_range)),
            Some(token) => match TimeRange::parse(token) {
                Some(range) => Some(RangeSpec::Token(range)),
                None => {
                    diag.reject("timeRange", "must be one of: 1h, 24h, 7d, 30d, 90d, 12m, 24m");
                    None
                }
            },
        }
    };

    diag.finish()?;

    Ok(MetricsQuery {
        range: range.unwrap_or(RangeSpec::Token(default_range)),
        category: non_empty(raw.category),
        region: non_empty(raw.region),
        church_branch_id: non_empty(raw.church_branch_id),
        forecasting: raw.forecasting.unwrap_or(false),
    })
}

/// Validate the per-proxy bandwidth range token (subset of [`TimeRange`]).
pub fn validate_bandwidth_range(raw: Option<&str>) -> Result<TimeRange, ValidationError> {
    let token = match raw {
        None => return Ok(TimeRange::LastDay),
        Some(token) => token,
    };
    match TimeRange::parse(token) {
        Some(
            range @ (TimeRange::LastHour
            | TimeRange::LastDay
            | TimeRange::LastWeek
            | TimeRange::LastMonth),
        ) => Ok(range),
        _ => Err(ValidationError::single(
            "range",
            "must be one of: 1h, 24h, 7d, 30d",
        )),
    }
}

fn parse_boundary(
    diag: &mut Diagnostics,
    field: &str,
    raw: Option<&str>,
) -> Option<DateTime<Utc>> {
    let raw = match raw {
        None => {
            diag.reject(field, "is required when the other boundary is given");
            return None;
        }
        Some(raw) => raw.trim(),
    };

    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }

    diag.reject(field, "must be an RFC 3339 timestamp or YYYY-MM-DD date");
    None
}
