//! The harvest orchestrator.
//!
//! One sweep: reconcile, budget, discover, then drive each candidate case
//! through the portal and the state machine, politely paced, with a
//! circuit breaker and a wall-clock budget. All state lives in the
//! tracking store, so an interrupted or duplicated run converges to the
//! same end state as a clean one.

mod process;
mod reconcile;
mod report;
mod sweep;

pub use process::CaseOutcome;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::HarvestSettings;
use crate::models::RetrievedDocument;
use crate::pipeline::{ExtractionPipeline, ObjectStore};
use crate::portal::{FetchOutcome, PortalError, WeblinkClient, WellFilesClient};
use crate::repository::{DocketRepository, HarvestRepository};

/// The single-case order retrieval seam (the WebLink flow).
#[async_trait]
pub trait OrderPortal: Send + Sync {
    async fn fetch_order(&self, case_number: &str) -> Result<FetchOutcome, PortalError>;
}

#[async_trait]
impl OrderPortal for WeblinkClient {
    async fn fetch_order(&self, case_number: &str) -> Result<FetchOutcome, PortalError> {
        WeblinkClient::fetch_order(self, case_number).await
    }
}

/// The bulk well-document listing seam (the well-files flow).
#[async_trait]
pub trait BulkPortal: Send + Sync {
    async fn fetch_well_documents(
        &self,
        well_id: &str,
        form_number: Option<&str>,
        entry_filter: Option<&[String]>,
    ) -> Result<(Vec<RetrievedDocument>, Option<FetchOutcome>), PortalError>;
}

#[async_trait]
impl BulkPortal for WellFilesClient {
    async fn fetch_well_documents(
        &self,
        well_id: &str,
        form_number: Option<&str>,
        entry_filter: Option<&[String]>,
    ) -> Result<(Vec<RetrievedDocument>, Option<FetchOutcome>), PortalError> {
        WellFilesClient::fetch_well_documents(self, well_id, form_number, entry_filter).await
    }
}

/// Owns one sweep's worth of collaborators. Cheap to clone behind Arcs;
/// the scheduled loop, the HTTP handlers, and the CLI all share one.
pub struct Harvester {
    pub(crate) harvest: Arc<HarvestRepository>,
    pub(crate) docket: Arc<DocketRepository>,
    pub(crate) portal: Arc<dyn OrderPortal>,
    pub(crate) bulk_portal: Arc<dyn BulkPortal>,
    pub(crate) pipeline: Arc<dyn ExtractionPipeline>,
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) user_id: String,
    pub(crate) config: HarvestSettings,
}

impl Harvester {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        harvest: Arc<HarvestRepository>,
        docket: Arc<DocketRepository>,
        portal: Arc<dyn OrderPortal>,
        bulk_portal: Arc<dyn BulkPortal>,
        pipeline: Arc<dyn ExtractionPipeline>,
        store: Arc<dyn ObjectStore>,
        user_id: String,
        config: HarvestSettings,
    ) -> Self {
        Self {
            harvest,
            docket,
            portal,
            bulk_portal,
            pipeline,
            store,
            user_id,
            config,
        }
    }
}
