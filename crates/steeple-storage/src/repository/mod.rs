//! Database repositories for each table.

pub mod proxies;
pub mod usage;

pub use proxies::{rtmp_fingerprint, ProxyRepo};
pub use usage::UsageRepo;
