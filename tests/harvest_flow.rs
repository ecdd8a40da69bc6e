//! End-to-end harvest flow tests over a real SQLite store with scripted
//! portal and pipeline implementations.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use regharvest::config::HarvestSettings;
use regharvest::harvest::{BulkPortal, CaseOutcome, Harvester, OrderPortal};
use regharvest::models::{
    DocketCase, DocumentMetadata, HarvestStatus, RetrievedDocument, SourceKind, SweepStop,
};
use regharvest::pipeline::{
    ExistingDocument, ExtractionPipeline, ObjectStore, PipelineError, ProcessingStatus,
    RegistrationRequest,
};
use regharvest::portal::{FetchOutcome, PortalError};
use regharvest::repository::{DocketRepository, HarvestRepository};
use regharvest::utils::normalize_case_number;

/// One scripted portal response.
enum Scripted {
    Document,
    NotFound,
    RateLimited,
    ServerError,
}

struct MockPortal {
    script: Mutex<VecDeque<Scripted>>,
    calls: AtomicUsize,
}

impl MockPortal {
    fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn sample_document(entry_id: &str) -> RetrievedDocument {
    RetrievedDocument {
        entry_id: entry_id.to_string(),
        metadata: DocumentMetadata {
            order_number: Some("745123".to_string()),
            ..Default::default()
        },
        content: b"%PDF-1.7 test body".to_vec(),
        content_type: "application/pdf".to_string(),
        source_url: format!("https://imaging.example.gov/doc/{entry_id}"),
        candidate_count: 1,
    }
}

#[async_trait]
impl OrderPortal for MockPortal {
    async fn fetch_order(&self, _case_number: &str) -> Result<FetchOutcome, PortalError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next.unwrap_or(Scripted::NotFound) {
            Scripted::Document => Ok(FetchOutcome::Retrieved(Box::new(sample_document(
                &format!("entry-{n}"),
            )))),
            Scripted::NotFound => Ok(FetchOutcome::NotFound),
            Scripted::RateLimited => Ok(FetchOutcome::RateLimited),
            Scripted::ServerError => Err(PortalError::ServerError {
                status: 500,
                url: "https://imaging.example.gov/search".to_string(),
            }),
        }
    }
}

struct MockBulk {
    documents: Vec<RetrievedDocument>,
}

#[async_trait]
impl BulkPortal for MockBulk {
    async fn fetch_well_documents(
        &self,
        _well_id: &str,
        _form_number: Option<&str>,
        _entry_filter: Option<&[String]>,
    ) -> Result<(Vec<RetrievedDocument>, Option<FetchOutcome>), PortalError> {
        Ok((self.documents.clone(), None))
    }
}

#[derive(Default)]
struct MockPipeline {
    existing: Mutex<HashMap<String, ExistingDocument>>,
    registered: Mutex<Vec<RegistrationRequest>>,
    statuses: Mutex<HashMap<String, ProcessingStatus>>,
    next_id: AtomicUsize,
}

impl MockPipeline {
    fn with_existing(case_number: &str, document_id: &str) -> Arc<Self> {
        let pipeline = Self::default();
        pipeline.existing.lock().unwrap().insert(
            normalize_case_number(case_number),
            ExistingDocument {
                id: document_id.to_string(),
                status: ProcessingStatus::Complete,
            },
        );
        Arc::new(pipeline)
    }

    fn set_status(&self, document_id: &str, status: ProcessingStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(document_id.to_string(), status);
    }

    fn registered_count(&self) -> usize {
        self.registered.lock().unwrap().len()
    }
}

#[async_trait]
impl ExtractionPipeline for MockPipeline {
    async fn find_document(
        &self,
        case_number: &str,
        normalized: &str,
    ) -> Result<Option<ExistingDocument>, PipelineError> {
        let existing = self.existing.lock().unwrap();
        Ok(existing
            .get(case_number)
            .or_else(|| existing.get(normalized))
            .cloned())
    }

    async fn register(&self, request: &RegistrationRequest) -> Result<String, PipelineError> {
        let id = format!("doc-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.registered.lock().unwrap().push(request.clone());
        self.statuses
            .lock()
            .unwrap()
            .insert(id.clone(), ProcessingStatus::Pending);
        Ok(id)
    }

    async fn document_status(
        &self,
        document_id: &str,
    ) -> Result<ProcessingStatus, PipelineError> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(document_id)
            .copied()
            .unwrap_or(ProcessingStatus::Pending))
    }
}

#[derive(Default)]
struct MemStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl ObjectStore for MemStore {
    async fn put(
        &self,
        key: &str,
        content: &[u8],
        _content_type: &str,
    ) -> Result<(), PipelineError> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), content.to_vec());
        Ok(())
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    harvest: Arc<HarvestRepository>,
    docket: Arc<DocketRepository>,
    portal: Arc<MockPortal>,
    pipeline: Arc<MockPipeline>,
    store: Arc<MemStore>,
    harvester: Harvester,
}

fn test_settings() -> HarvestSettings {
    HarvestSettings {
        delay_ms: 0,
        jitter_ms: 0,
        ..Default::default()
    }
}

fn harness(config: HarvestSettings, portal: Arc<MockPortal>, pipeline: Arc<MockPipeline>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("harvest.db");
    let harvest = Arc::new(HarvestRepository::new(&db).unwrap());
    let docket = Arc::new(DocketRepository::new(&db).unwrap());
    let store = Arc::new(MemStore::default());
    let bulk = Arc::new(MockBulk { documents: vec![] });

    let harvester = Harvester::new(
        harvest.clone(),
        docket.clone(),
        portal.clone(),
        bulk,
        pipeline.clone(),
        store.clone(),
        "operator-1".to_string(),
        config,
    );

    Harness {
        _dir: dir,
        harvest,
        docket,
        portal,
        pipeline,
        store,
        harvester,
    }
}

fn docket_case(case_number: &str, days_ago: i64) -> DocketCase {
    DocketCase {
        case_number: case_number.to_string(),
        filing_type: "Pooling".to_string(),
        status: "Order Issued".to_string(),
        applicant: Some("Acme Operating".to_string()),
        county: Some("KINGFISHER".to_string()),
        legal_description: Some("SEC 12-17N-08W".to_string()),
        hearing_date: Some(Utc::now() - Duration::days(days_ago)),
        well_id: None,
    }
}

#[tokio::test]
async fn sweep_fetches_discovered_case_end_to_end() {
    let h = harness(
        test_settings(),
        MockPortal::new(vec![Scripted::Document]),
        Arc::new(MockPipeline::default()),
    );
    h.docket.ingest_case(&docket_case("CD 2025-002808", 2)).unwrap();

    let outcome = h.harvester.run_sweep().await.unwrap();

    assert_eq!(outcome.stopped, SweepStop::Completed);
    assert_eq!(outcome.checked, 1);
    assert_eq!(outcome.fetched, 1);

    let case = h.harvest.get_case("CD 2025-002808").unwrap().unwrap();
    assert_eq!(case.status, HarvestStatus::Fetched);
    assert_eq!(case.attempt_count, 1);
    assert_eq!(case.document_id.as_deref(), Some("doc-1"));
    assert_eq!(case.order_number.as_deref(), Some("745123"));

    // Bytes landed in object storage under the per-user harvest prefix.
    let objects = h.store.objects.lock().unwrap();
    assert_eq!(objects.len(), 1);
    let key = objects.keys().next().unwrap();
    assert!(key.starts_with("operator-1/harvest/"));
    assert!(key.ends_with(".pdf"));

    // Registration carried the case linkage.
    let registered = h.pipeline.registered.lock().unwrap();
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].case_number.as_deref(), Some("CD 2025-002808"));
    assert_eq!(registered[0].source_kind, SourceKind::PoolingOrder);
    assert_eq!(registered[0].user_id, "operator-1");
    assert_eq!(registered[0].content_hash.len(), 64);
}

#[tokio::test]
async fn duplicate_guard_skips_without_touching_portal() {
    let h = harness(
        test_settings(),
        MockPortal::new(vec![]),
        MockPipeline::with_existing("CD 2025-002808", "doc-77"),
    );
    h.docket.ingest_case(&docket_case("CD 2025-002808", 2)).unwrap();

    let outcome = h.harvester.run_sweep().await.unwrap();

    assert_eq!(outcome.skipped, 1);
    assert_eq!(h.portal.calls(), 0);

    let case = h.harvest.get_case("CD 2025-002808").unwrap().unwrap();
    assert_eq!(case.status, HarvestStatus::Skipped);
    assert_eq!(case.document_id.as_deref(), Some("doc-77"));
    // No attempt was consumed from the daily budget.
    assert_eq!(case.attempt_count, 0);
}

#[tokio::test]
async fn no_order_schedules_backoff_and_is_not_reattempted_early() {
    let h = harness(
        test_settings(),
        MockPortal::new(vec![Scripted::NotFound]),
        Arc::new(MockPipeline::default()),
    );
    h.docket.ingest_case(&docket_case("CD 2025-002808", 2)).unwrap();

    let outcome = h.harvester.run_sweep().await.unwrap();
    assert_eq!(outcome.no_order, 1);

    let case = h.harvest.get_case("CD 2025-002808").unwrap().unwrap();
    assert_eq!(case.status, HarvestStatus::NoOrder);
    assert_eq!(case.attempt_count, 1);
    let next_retry = case.next_retry_at.unwrap();
    assert!(next_retry > Utc::now() + Duration::days(2));
    assert!(next_retry < Utc::now() + Duration::days(4));

    // Sweeping again immediately does nothing: the case is tracked and
    // its retry is not due.
    let again = h.harvester.run_sweep().await.unwrap();
    assert_eq!(again.checked, 0);
    assert_eq!(h.portal.calls(), 1);
    let case = h.harvest.get_case("CD 2025-002808").unwrap().unwrap();
    assert_eq!(case.attempt_count, 1);
}

#[tokio::test]
async fn rate_limit_aborts_sweep_and_case_resumes_next_run() {
    let h = harness(
        test_settings(),
        MockPortal::new(vec![Scripted::RateLimited, Scripted::Document, Scripted::Document]),
        Arc::new(MockPipeline::default()),
    );
    h.docket.ingest_case(&docket_case("CD 2025-000500", 1)).unwrap();
    h.docket.ingest_case(&docket_case("CD 2025-000501", 2)).unwrap();

    let outcome = h.harvester.run_sweep().await.unwrap();
    assert_eq!(outcome.stopped, SweepStop::RateLimited);
    // The throttled case is neither checked nor an error.
    assert_eq!(outcome.checked, 0);
    assert_eq!(outcome.errors, 0);
    assert_eq!(h.portal.calls(), 1);

    // The interrupted case is stranded mid-attempt.
    let stranded = h.harvest.get_case("CD 2025-000500").unwrap().unwrap();
    assert_eq!(stranded.status, HarvestStatus::Fetching);
    assert_eq!(stranded.attempt_count, 1);

    // Next run picks the stranded case back up along with the untouched one.
    let next = h.harvester.run_sweep().await.unwrap();
    assert_eq!(next.stopped, SweepStop::Completed);
    assert_eq!(next.fetched, 2);
    for case_number in ["CD 2025-000500", "CD 2025-000501"] {
        let case = h.harvest.get_case(case_number).unwrap().unwrap();
        assert_eq!(case.status, HarvestStatus::Fetched);
    }
}

#[tokio::test]
async fn circuit_breaker_trips_after_consecutive_errors() {
    let script = (0..10).map(|_| Scripted::ServerError).collect();
    let h = harness(
        test_settings(),
        MockPortal::new(script),
        Arc::new(MockPipeline::default()),
    );
    for i in 0..10 {
        h.docket
            .ingest_case(&docket_case(&format!("CD 2025-00{i:04}"), i + 1))
            .unwrap();
    }

    let outcome = h.harvester.run_sweep().await.unwrap();
    assert_eq!(outcome.stopped, SweepStop::CircuitBreaker);
    assert_eq!(outcome.errors, 5);
    assert_eq!(h.portal.calls(), 5);
}

#[tokio::test]
async fn a_success_resets_the_error_streak() {
    let script = vec![
        Scripted::ServerError,
        Scripted::ServerError,
        Scripted::Document,
        Scripted::ServerError,
        Scripted::ServerError,
        Scripted::NotFound,
    ];
    let h = harness(
        test_settings(),
        MockPortal::new(script),
        Arc::new(MockPipeline::default()),
    );
    for i in 0..6 {
        h.docket
            .ingest_case(&docket_case(&format!("CD 2025-01{i:04}"), i + 1))
            .unwrap();
    }

    let outcome = h.harvester.run_sweep().await.unwrap();
    assert_eq!(outcome.stopped, SweepStop::Completed);
    assert_eq!(outcome.errors, 4);
    assert_eq!(outcome.fetched, 1);
    assert_eq!(outcome.no_order, 1);
}

#[tokio::test]
async fn daily_cap_limits_attempts_across_runs() {
    let config = HarvestSettings {
        daily_cap: 2,
        ..test_settings()
    };
    let h = harness(
        config,
        MockPortal::new(vec![Scripted::Document, Scripted::Document]),
        Arc::new(MockPipeline::default()),
    );
    for i in 0..5 {
        h.docket
            .ingest_case(&docket_case(&format!("CD 2025-02{i:04}"), i + 1))
            .unwrap();
    }

    let first = h.harvester.run_sweep().await.unwrap();
    assert_eq!(first.checked, 2);
    assert_eq!(h.portal.calls(), 2);

    // Budget spent: the next run inside the window does nothing.
    let second = h.harvester.run_sweep().await.unwrap();
    assert_eq!(second.stopped, SweepStop::BudgetExhausted);
    assert_eq!(second.checked, 0);
    assert_eq!(h.portal.calls(), 2);
}

#[tokio::test]
async fn fetched_cases_reconcile_to_processed() {
    let h = harness(
        test_settings(),
        MockPortal::new(vec![Scripted::Document]),
        Arc::new(MockPipeline::default()),
    );
    h.docket.ingest_case(&docket_case("CD 2025-002808", 2)).unwrap();
    h.harvester.run_sweep().await.unwrap();

    // Downstream completes between runs.
    h.pipeline.set_status("doc-1", ProcessingStatus::Complete);

    let outcome = h.harvester.run_sweep().await.unwrap();
    assert_eq!(outcome.reconciled, 1);

    let case = h.harvest.get_case("CD 2025-002808").unwrap().unwrap();
    assert_eq!(case.status, HarvestStatus::Processed);
    assert!(case.processed_at.is_some());
    assert_eq!(case.document_id.as_deref(), Some("doc-1"));
}

#[tokio::test]
async fn pending_downstream_status_defers_reconciliation() {
    let h = harness(
        test_settings(),
        MockPortal::new(vec![Scripted::Document]),
        Arc::new(MockPipeline::default()),
    );
    h.docket.ingest_case(&docket_case("CD 2025-002808", 2)).unwrap();
    h.harvester.run_sweep().await.unwrap();

    let outcome = h.harvester.run_sweep().await.unwrap();
    assert_eq!(outcome.reconciled, 0);
    let case = h.harvest.get_case("CD 2025-002808").unwrap().unwrap();
    assert_eq!(case.status, HarvestStatus::Fetched);
}

#[tokio::test]
async fn process_single_fetches_an_untracked_case() {
    let h = harness(
        test_settings(),
        MockPortal::new(vec![Scripted::Document]),
        Arc::new(MockPipeline::default()),
    );

    let outcome = h.harvester.process_single("CD 2025-009999").await.unwrap();
    assert!(matches!(outcome, CaseOutcome::Fetched { .. }));

    let case = h.harvest.get_case("CD 2025-009999").unwrap().unwrap();
    assert_eq!(case.status, HarvestStatus::Fetched);
}

#[tokio::test]
async fn process_single_reports_terminal_standing_without_refetch() {
    let h = harness(
        test_settings(),
        MockPortal::new(vec![Scripted::Document]),
        Arc::new(MockPipeline::default()),
    );
    h.docket.ingest_case(&docket_case("CD 2025-002808", 2)).unwrap();
    h.harvester.run_sweep().await.unwrap();
    assert_eq!(h.portal.calls(), 1);

    let outcome = h.harvester.process_single("CD 2025-002808").await.unwrap();
    match outcome {
        CaseOutcome::Skipped { document_id } => {
            assert_eq!(document_id.as_deref(), Some("doc-1"));
        }
        other => panic!("expected terminal standing, got {other:?}"),
    }
    assert_eq!(h.portal.calls(), 1);
}

#[tokio::test]
async fn a_fetched_case_never_regresses_through_single_processing() {
    let h = harness(
        test_settings(),
        MockPortal::new(vec![Scripted::Document]),
        Arc::new(MockPipeline::default()),
    );
    h.docket.ingest_case(&docket_case("CD 2025-050000", 2)).unwrap();
    h.harvester.run_sweep().await.unwrap();

    // The portal script is spent: a refetch would see no results and
    // rewrite the row out of `fetched`.
    let outcome = h.harvester.process_single("CD 2025-050000").await.unwrap();
    assert_eq!(
        outcome,
        CaseOutcome::Skipped {
            document_id: Some("doc-1".to_string())
        }
    );

    let case = h.harvest.get_case("CD 2025-050000").unwrap().unwrap();
    assert_eq!(case.status, HarvestStatus::Fetched);
    assert_eq!(case.attempt_count, 1);
    assert_eq!(case.document_id.as_deref(), Some("doc-1"));
    assert_eq!(h.portal.calls(), 1);
}

#[tokio::test]
async fn transient_error_is_retried_on_the_next_sweep() {
    let h = harness(
        test_settings(),
        MockPortal::new(vec![Scripted::ServerError, Scripted::Document]),
        Arc::new(MockPipeline::default()),
    );
    h.docket.ingest_case(&docket_case("CD 2025-060000", 2)).unwrap();

    let first = h.harvester.run_sweep().await.unwrap();
    assert_eq!(first.errors, 1);
    let case = h.harvest.get_case("CD 2025-060000").unwrap().unwrap();
    assert_eq!(case.status, HarvestStatus::Error);
    assert_eq!(case.attempt_count, 1);

    // Errors wait for no backoff deadline; the next run picks them up.
    let second = h.harvester.run_sweep().await.unwrap();
    assert_eq!(second.fetched, 1);
    assert_eq!(second.retries_attempted, 1);
    assert_eq!(h.portal.calls(), 2);
    let case = h.harvest.get_case("CD 2025-060000").unwrap().unwrap();
    assert_eq!(case.status, HarvestStatus::Fetched);
}

#[tokio::test]
async fn backfill_honors_minimum_hearing_date() {
    let h = harness(
        test_settings(),
        MockPortal::new(vec![Scripted::Document, Scripted::Document]),
        Arc::new(MockPipeline::default()),
    );
    h.docket.ingest_case(&docket_case("CD 2023-000001", 700)).unwrap();
    h.docket.ingest_case(&docket_case("CD 2025-000900", 5)).unwrap();

    let outcome = h
        .harvester
        .run_backfill(Utc::now() - Duration::days(30), 50)
        .await
        .unwrap();
    assert_eq!(outcome.checked, 1);
    assert!(h.harvest.get_case("CD 2023-000001").unwrap().is_none());
    assert!(h.harvest.get_case("CD 2025-000900").unwrap().is_some());
}

#[tokio::test]
async fn well_harvest_registers_every_document() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("harvest.db");
    let harvest = Arc::new(HarvestRepository::new(&db).unwrap());
    let docket = Arc::new(DocketRepository::new(&db).unwrap());
    let pipeline = Arc::new(MockPipeline::default());
    let store = Arc::new(MemStore::default());
    let bulk = Arc::new(MockBulk {
        documents: vec![sample_document("w-1"), sample_document("w-2")],
    });

    let harvester = Harvester::new(
        harvest,
        docket,
        MockPortal::new(vec![]),
        bulk,
        pipeline.clone(),
        store,
        "operator-1".to_string(),
        test_settings(),
    );

    let registered = harvester
        .harvest_well("3501724843", Some("1002A"), SourceKind::CompletionReport, None)
        .await
        .unwrap();

    assert_eq!(registered, vec!["doc-1", "doc-2"]);
    assert_eq!(pipeline.registered_count(), 2);
    let requests = pipeline.registered.lock().unwrap();
    assert!(requests
        .iter()
        .all(|r| r.well_id.as_deref() == Some("3501724843")));
    assert!(requests
        .iter()
        .all(|r| r.source_kind == SourceKind::CompletionReport));
}

#[tokio::test]
async fn daily_stats_accumulate_across_runs() {
    let h = harness(
        test_settings(),
        MockPortal::new(vec![Scripted::Document, Scripted::NotFound]),
        Arc::new(MockPipeline::default()),
    );
    h.docket.ingest_case(&docket_case("CD 2025-030000", 1)).unwrap();
    h.harvester.run_sweep().await.unwrap();
    h.docket.ingest_case(&docket_case("CD 2025-030001", 2)).unwrap();
    h.harvester.run_sweep().await.unwrap();

    let stat = h
        .harvest
        .get_daily_stat(Utc::now().date_naive())
        .unwrap()
        .unwrap();
    assert_eq!(stat.cases_checked, 2);
    assert_eq!(stat.orders_found, 1);
    assert_eq!(stat.no_order, 1);
    assert!(stat.runs >= 2);
}
