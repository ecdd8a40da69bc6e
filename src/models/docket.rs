//! Upstream docket feed rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A candidate case from the upstream docket feed.
///
/// The feed itself is out of scope; this is the read-side interface the
/// discovery queries select from. Descriptive fields are copied onto the
/// harvest row at discovery time and never re-fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocketCase {
    pub case_number: String,
    /// Relief/filing type, e.g. "Pooling".
    pub filing_type: String,
    /// Docket status, e.g. "Order Issued".
    pub status: String,
    pub applicant: Option<String>,
    pub county: Option<String>,
    pub legal_description: Option<String>,
    pub hearing_date: Option<DateTime<Utc>>,
    /// API well identifier, when the filing names one.
    pub well_id: Option<String>,
}
