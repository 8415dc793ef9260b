//! API request and response models.

use serde::{Deserialize, Serialize};

use steeple_core::proxy::ProxyStatus;
use steeple_storage::ProxyPage;

/// Uniform success envelope: `{success, data, metadata?}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PageMeta>,
}

impl<T: Serialize> Envelope<T> {
    /// A plain success response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            metadata: None,
        }
    }

    /// A success response carrying pagination metadata.
    pub fn paginated(data: T, metadata: PageMeta) -> Self {
        Self {
            success: true,
            data,
            metadata: Some(metadata),
        }
    }
}

/// Pagination metadata attached to every list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub has_more: bool,
}

impl From<&ProxyPage> for PageMeta {
    fn from(page: &ProxyPage) -> Self {
        Self {
            total: page.total,
            page: page.page,
            page_size: page.page_size,
            has_more: page.has_more,
        }
    }
}

/// Confirmation body for DELETE /proxies/{id}.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteConfirmation {
    pub id: String,
    pub status: ProxyStatus,
    pub message: String,
}

/// Request body for POST /analytics/export.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportRequest {
    /// Requested encoding: structured, tabular, or document.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// The report payload to format.
    pub data: Option<serde_json::Value>,
    /// Echoed back for bookkeeping; not interpreted here.
    pub time_range: Option<String>,
    pub filters: Option<serde_json::Value>,
}

/// Query string for GET /proxies/{id}/bandwidth.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BandwidthQuery {
    pub range: Option<String>,
}
