//! Reconciliation of `fetched` cases against the downstream pipeline.
//!
//! The only state mutation not driven by a fetch attempt: once the
//! pipeline reports a registered document complete, the case advances to
//! `processed`.

use tracing::{debug, warn};

use super::Harvester;
use crate::pipeline::ProcessingStatus;

impl Harvester {
    /// Advance `fetched` cases whose registered document is complete.
    /// Returns the number reconciled; lookup failures are logged and
    /// deferred to the next run.
    pub(crate) async fn reconcile_fetched(&self) -> u64 {
        let cases = match self.harvest.fetched_cases(self.config.reconcile_batch) {
            Ok(cases) => cases,
            Err(e) => {
                warn!(error = %e, "could not load fetched cases for reconciliation");
                return 0;
            }
        };

        let mut reconciled = 0u64;
        for mut case in cases {
            // fetched_cases only returns rows with a document id.
            let Some(document_id) = case.document_id.clone() else {
                continue;
            };
            match self.pipeline.document_status(&document_id).await {
                Ok(ProcessingStatus::Complete) => {
                    case.mark_processed();
                    match self.harvest.upsert_case(&case) {
                        Ok(()) => {
                            debug!(case_number = %case.case_number, document_id, "reconciled to processed");
                            reconciled += 1;
                        }
                        Err(e) => {
                            warn!(case_number = %case.case_number, error = %e, "reconcile write failed")
                        }
                    }
                }
                Ok(status) => {
                    debug!(case_number = %case.case_number, ?status, "document not complete yet")
                }
                Err(e) => {
                    warn!(case_number = %case.case_number, error = %e, "status lookup failed")
                }
            }
        }
        reconciled
    }
}
