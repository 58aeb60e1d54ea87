//! Records returned by the link registry

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A short identifier mapped to its redirect target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortLink {
    /// Opaque URL-safe identifier
    pub id: String,
    /// Absolute URL the identifier redirects to
    pub target_url: String,
    /// Creation time, UTC
    pub created_at: DateTime<Utc>,
}

/// One successful resolution of a short link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    /// Monotonic sequence number
    pub id: i64,
    /// Link that was resolved
    pub link_id: String,
    /// Resolution time, UTC
    pub scanned_at: DateTime<Utc>,
    /// Client user-agent, or `"unknown"`
    pub user_agent: String,
}

/// A link together with its scan count at query time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSummary {
    /// The link itself
    #[serde(flatten)]
    pub link: ShortLink,
    /// Number of recorded scans
    pub scan_count: u64,
}

/// Scans bucketed by UTC calendar date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateCount {
    /// Calendar date (UTC)
    pub date: NaiveDate,
    /// Scans recorded on that date
    pub count: u64,
}

/// Full scan history for one link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDetail {
    /// The link itself
    pub link: ShortLink,
    /// All scans, newest first
    pub scans: Vec<ScanEvent>,
    /// Per-date counts, oldest date first
    pub per_date_counts: Vec<DateCount>,
}
