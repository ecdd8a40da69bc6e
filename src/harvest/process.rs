//! Per-case processing: duplicate guard, portal fetch, hand-off, and the
//! state-machine transition, persisted as each step lands.

use chrono::Utc;
use tracing::{info, warn};

use super::Harvester;
use crate::models::{DocketCase, HarvestCase, RetrievedDocument, SourceKind};
use crate::pipeline::{storage_key, RegistrationRequest};
use crate::portal::FetchOutcome;
use crate::utils::{normalize_case_number, sanitize_filename};

/// How one case's processing ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOutcome {
    /// Document retrieved, stored, and registered downstream.
    Fetched { document_id: String },
    /// Portal has no matching order yet; retry scheduled per backoff.
    NoOrder,
    /// A document already existed downstream; no portal call was made.
    Skipped { document_id: Option<String> },
    /// The portal signaled throttling; the sweep must abort.
    RateLimited,
    /// Transient failure, recorded on the case row.
    Failed { message: String },
}

impl Harvester {
    /// Seed a harvest row from a docket candidate.
    pub(crate) fn case_from_docket(docket: &DocketCase) -> HarvestCase {
        let mut case = HarvestCase::new(docket.case_number.clone());
        case.docket_status = Some(docket.status.clone());
        case.applicant = docket.applicant.clone();
        case.county = docket.county.clone();
        case.legal_description = docket.legal_description.clone();
        case.hearing_date = docket.hearing_date;
        case
    }

    /// Run the full per-case flow, persisting every transition.
    ///
    /// The duplicate guard runs before the attempt is recorded, even on
    /// first attempts: an operator or another entry point may already have
    /// submitted this case.
    pub(crate) async fn process_case(&self, case: &mut HarvestCase) -> CaseOutcome {
        let case_number = case.case_number.clone();
        let normalized = normalize_case_number(&case_number);

        match self.pipeline.find_document(&case_number, &normalized).await {
            Ok(Some(existing)) => {
                info!(case_number, document_id = %existing.id, "document already downstream; skipping");
                case.mark_skipped(Some(existing.id.clone()));
                if let Err(e) = self.harvest.upsert_case(case) {
                    return CaseOutcome::Failed {
                        message: format!("tracking write failed: {e}"),
                    };
                }
                return CaseOutcome::Skipped {
                    document_id: Some(existing.id),
                };
            }
            Ok(None) => {}
            Err(e) => {
                let message = format!("duplicate lookup failed: {e}");
                warn!(case_number, error = %e, "duplicate guard unavailable");
                case.mark_error(&message);
                let _ = self.harvest.upsert_case(case);
                return CaseOutcome::Failed { message };
            }
        }

        // Record the attempt before touching the portal so the daily cap
        // holds even if this process dies mid-case.
        case.mark_fetching(Utc::now());
        if let Err(e) = self.harvest.upsert_case(case) {
            return CaseOutcome::Failed {
                message: format!("tracking write failed: {e}"),
            };
        }

        match self.portal.fetch_order(&case_number).await {
            Ok(FetchOutcome::Retrieved(document)) => {
                self.finish_retrieved(case, *document).await
            }
            Ok(FetchOutcome::NotFound) => {
                case.mark_no_order(
                    Utc::now(),
                    self.config.base_backoff_days,
                    self.config.max_attempts,
                );
                if let Err(e) = self.harvest.upsert_case(case) {
                    return CaseOutcome::Failed {
                        message: format!("tracking write failed: {e}"),
                    };
                }
                CaseOutcome::NoOrder
            }
            Ok(FetchOutcome::RateLimited) => {
                // Not an error and not a state change: the case stays
                // where the attempt left it and resumes next run.
                CaseOutcome::RateLimited
            }
            Err(e) => {
                let message = e.to_string();
                case.mark_error(&message);
                let _ = self.harvest.upsert_case(case);
                CaseOutcome::Failed { message }
            }
        }
    }

    /// Store, register, and mark fetched. The document id write and the
    /// `fetched` transition land together; a registration failure leaves
    /// the case in `error` rather than fetched-without-id.
    async fn finish_retrieved(
        &self,
        case: &mut HarvestCase,
        document: RetrievedDocument,
    ) -> CaseOutcome {
        if document.candidate_count > 1 {
            case.note = Some(format!(
                "{} order candidates on file; selected entry {}",
                document.candidate_count, document.entry_id
            ));
        }

        match self
            .hand_off(
                &case.case_number,
                &document,
                SourceKind::PoolingOrder,
                None,
            )
            .await
        {
            Ok(document_id) => {
                let order_number = document.metadata.order_number.clone();
                case.mark_fetched(document_id.clone(), order_number);
                if let Err(e) = self.harvest.upsert_case(case) {
                    return CaseOutcome::Failed {
                        message: format!("tracking write failed: {e}"),
                    };
                }
                info!(
                    case_number = %case.case_number,
                    document_id,
                    bytes = document.content.len(),
                    "order fetched and registered"
                );
                CaseOutcome::Fetched { document_id }
            }
            Err(message) => {
                case.mark_error(&message);
                let _ = self.harvest.upsert_case(case);
                CaseOutcome::Failed { message }
            }
        }
    }

    /// Persist bytes to object storage, then register downstream.
    pub(crate) async fn hand_off(
        &self,
        case_number: &str,
        document: &RetrievedDocument,
        kind: SourceKind,
        well_id: Option<&str>,
    ) -> Result<String, String> {
        let filename = format!(
            "{}-{}.pdf",
            sanitize_filename(case_number),
            document.entry_id
        );
        let key = storage_key(&self.user_id, Utc::now(), &filename);

        self.store
            .put(&key, &document.content, &document.content_type)
            .await
            .map_err(|e| format!("object store write failed: {e}"))?;

        let request = RegistrationRequest {
            storage_key: key,
            user_id: self.user_id.clone(),
            filename,
            byte_size: document.content.len() as u64,
            content_type: document.content_type.clone(),
            source_kind: kind,
            case_number: Some(case_number.to_string()),
            well_id: well_id.map(|s| s.to_string()),
            source_url: document.source_url.clone(),
            content_hash: document.content_hash(),
            metadata: document.metadata.clone(),
        };

        self.pipeline
            .register(&request)
            .await
            .map_err(|e| format!("registration failed: {e}"))
    }

    /// Process exactly one named case synchronously, bypassing the daily
    /// cap. Diagnostics path behind POST /test and the `test-case` command.
    pub async fn process_single(&self, case_number: &str) -> anyhow::Result<CaseOutcome> {
        let mut case = match self.harvest.get_case(case_number)? {
            Some(case) => case,
            None => match self.docket.get_case(case_number)? {
                Some(docket) => Self::case_from_docket(&docket),
                None => HarvestCase::new(case_number.to_string()),
            },
        };

        // A case holding a document reports its standing instead of
        // refetching; the state machine never regresses out of `fetched`.
        if case.has_document() {
            return Ok(CaseOutcome::Skipped {
                document_id: case.document_id,
            });
        }

        if case.is_terminal(self.config.max_attempts) {
            return Ok(match case.status {
                crate::models::HarvestStatus::Error => CaseOutcome::Failed {
                    message: case.last_error.unwrap_or_else(|| "error".to_string()),
                },
                crate::models::HarvestStatus::NoOrder => CaseOutcome::NoOrder,
                _ => CaseOutcome::Skipped {
                    document_id: case.document_id,
                },
            });
        }

        Ok(self.process_case(&mut case).await)
    }

    /// Retrieve and hand off every matching well document independently.
    /// Returns the registered document ids.
    pub async fn harvest_well(
        &self,
        well_id: &str,
        form_number: Option<&str>,
        kind: SourceKind,
        entry_filter: Option<&[String]>,
    ) -> anyhow::Result<Vec<String>> {
        let (documents, throttled) = self
            .bulk_portal
            .fetch_well_documents(well_id, form_number, entry_filter)
            .await?;

        let mut registered = Vec::with_capacity(documents.len());
        for document in &documents {
            match self.hand_off(well_id, document, kind, Some(well_id)).await {
                Ok(id) => registered.push(id),
                Err(message) => warn!(well_id, entry_id = %document.entry_id, message, "well document hand-off failed"),
            }
        }

        if throttled.is_some() {
            warn!(well_id, "well files listing throttled; partial result");
        }
        Ok(registered)
    }
}
