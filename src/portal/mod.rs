//! Legacy portal protocol clients.
//!
//! Two related sub-systems live behind the state document portal: the
//! WebLink repository that serves signed orders through an asynchronous
//! search -> generate -> poll -> download flow, and the well-files imaging
//! system that serves completion reports and drilling permits through a
//! paginated listing with direct downloads. Neither publishes an API
//! contract; endpoint paths and field names here were recovered by
//! observation, so every response is parsed defensively and every payload
//! is magic-byte validated before it leaves this module.

pub mod laserfiche;
pub mod query;
pub mod session;
pub mod wellfiles;

pub use laserfiche::WeblinkClient;
pub use session::{PortalSystem, SessionCache, SessionCookies};
pub use wellfiles::WellFilesClient;

use crate::models::RetrievedDocument;

/// Errors from portal protocol drives. All of these are transient from
/// the orchestrator's point of view: the case is recorded as `error` and
/// retried on a later run.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("login failed for {system}: {reason}")]
    Auth { system: &'static str, reason: String },

    #[error("malformed portal response: {0}")]
    Malformed(String),

    #[error("PDF generation did not complete within {attempts} polls")]
    GenerationTimeout { attempts: u32 },

    #[error("downloaded payload is not a PDF ({detected})")]
    NotPdf { detected: &'static str },

    #[error("server error {status} from {url}")]
    ServerError { status: u16, url: String },
}

/// Typed outcome of a single-case retrieval.
#[derive(Debug)]
pub enum FetchOutcome {
    /// A validated document, ready for hand-off.
    Retrieved(Box<RetrievedDocument>),
    /// The portal has no matching document yet; retry with backoff.
    NotFound,
    /// The portal signaled throttling; the run must abort immediately.
    RateLimited,
}

/// Whether an HTTP status is a throttling signal.
///
/// 429 and 503 are treated as definite rate limits; everything else is
/// classified by the caller.
pub(crate) fn is_rate_limit_status(status: u16) -> bool {
    matches!(status, 429 | 503)
}
