//! Hand-off to the downstream extraction pipeline.
//!
//! The core's contract with extraction is narrow: persist bytes to object
//! storage, register the document, and later ask whether processing
//! finished. Everything past registration (OCR, NLP, indexing) is out of
//! scope. The traits here are the seam the orchestrator and the tests
//! share; `http` holds the production implementation.

pub mod http;
pub mod storage;

pub use http::{HttpPipeline, PipelineConfig};
pub use storage::{storage_key, FsObjectStore};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{DocumentMetadata, SourceKind};

/// Errors from the registration/storage boundary.
///
/// All of these surface as case `error` (transient; retried next run).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("pipeline rejected request: {status} {message}")]
    Api { status: u16, message: String },

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("malformed pipeline response: {0}")]
    Malformed(String),
}

/// Downstream processing status of a registered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl ProcessingStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "complete" | "completed" => Some(Self::Complete),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A document the pipeline already knows about for a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistingDocument {
    pub id: String,
    pub status: ProcessingStatus,
}

/// Everything the registration call carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub storage_key: String,
    pub user_id: String,
    pub filename: String,
    pub byte_size: u64,
    pub content_type: String,
    pub source_kind: SourceKind,
    pub case_number: Option<String>,
    pub well_id: Option<String>,
    pub source_url: String,
    pub content_hash: String,
    pub metadata: DocumentMetadata,
}

/// The extraction pipeline's registration interface.
#[async_trait]
pub trait ExtractionPipeline: Send + Sync {
    /// Look up an existing document by exact or normalized case number.
    /// This is the duplicate-submission guard's query.
    async fn find_document(
        &self,
        case_number: &str,
        normalized: &str,
    ) -> Result<Option<ExistingDocument>, PipelineError>;

    /// Register a stored document; returns the pipeline's document id.
    async fn register(&self, request: &RegistrationRequest) -> Result<String, PipelineError>;

    /// Current processing status of a registered document.
    async fn document_status(&self, document_id: &str)
        -> Result<ProcessingStatus, PipelineError>;
}

/// Durable object storage for retrieved document bytes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<(), PipelineError>;
}
