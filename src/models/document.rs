//! Retrieved document values handed from the portal client to the
//! downstream registration step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Which kind of filing a document came from.
///
/// Carried as the source-type tag on the downstream registration call so
/// the extraction pipeline can route pooling orders, completion reports,
/// and drilling permits to different extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    PoolingOrder,
    CompletionReport,
    DrillingPermit,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PoolingOrder => "pooling_order",
            Self::CompletionReport => "completion_report",
            Self::DrillingPermit => "drilling_permit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pooling_order" => Some(Self::PoolingOrder),
            "completion_report" => Some(Self::CompletionReport),
            "drilling_permit" => Some(Self::DrillingPermit),
            _ => None,
        }
    }
}

/// Descriptive metadata recovered from the portal search step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub applicant: Option<String>,
    pub county: Option<String>,
    pub legal_description: Option<String>,
    /// Relief type or form type, depending on the portal sub-system.
    pub relief_type: Option<String>,
    /// Signing or effective date of the order.
    pub signed_date: Option<DateTime<Utc>>,
    /// The portal's order/document number, when present.
    pub order_number: Option<String>,
}

/// The result of one successful portal retrieval.
///
/// Transient: produced by the portal client, consumed immediately by the
/// hand-off step, never held beyond a single processing iteration.
#[derive(Debug, Clone)]
pub struct RetrievedDocument {
    /// Stable entry identifier from the portal.
    pub entry_id: String,
    /// Metadata from the search result.
    pub metadata: DocumentMetadata,
    /// Raw document bytes, already magic-header validated.
    pub content: Vec<u8>,
    /// Validated content type.
    pub content_type: String,
    /// The original portal URL the bytes came from.
    pub source_url: String,
    /// How many candidate entries matched the search. More than one means
    /// the client picked the most recent and the choice should be audited.
    pub candidate_count: usize,
}

impl RetrievedDocument {
    /// SHA-256 of the document content, hex encoded.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.content);
        hex::encode(hasher.finalize())
    }
}
