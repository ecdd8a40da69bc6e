//! Case row operations.

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::helpers::row_to_case;
use super::HarvestRepository;
use crate::models::HarvestCase;
use crate::repository::Result;

impl HarvestRepository {
    /// Insert or update a case row, keyed by case number.
    ///
    /// Descriptive and linkage fields coalesce the new value over the old
    /// one so a write carrying `None` never clears what a previous run
    /// recorded; `document_id` in particular is never cleared once set.
    /// `attempt_count` takes the max of old and new. Forward-only status
    /// transitions are the caller's responsibility (the state machine
    /// methods on `HarvestCase` are the only mutation path).
    pub fn upsert_case(&self, case: &HarvestCase) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO harvest_cases (
                case_number, docket_status, applicant, county, legal_description,
                hearing_date, status, attempt_count, last_attempt_at, next_retry_at,
                last_error, document_id, order_number, note, fetched_at,
                processed_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            ON CONFLICT(case_number) DO UPDATE SET
                docket_status = COALESCE(excluded.docket_status, docket_status),
                applicant = COALESCE(excluded.applicant, applicant),
                county = COALESCE(excluded.county, county),
                legal_description = COALESCE(excluded.legal_description, legal_description),
                hearing_date = COALESCE(excluded.hearing_date, hearing_date),
                status = excluded.status,
                attempt_count = MAX(attempt_count, excluded.attempt_count),
                last_attempt_at = COALESCE(excluded.last_attempt_at, last_attempt_at),
                next_retry_at = excluded.next_retry_at,
                last_error = excluded.last_error,
                document_id = COALESCE(excluded.document_id, document_id),
                order_number = COALESCE(excluded.order_number, order_number),
                note = COALESCE(excluded.note, note),
                fetched_at = COALESCE(excluded.fetched_at, fetched_at),
                processed_at = COALESCE(excluded.processed_at, processed_at),
                updated_at = excluded.updated_at
            "#,
            params![
                case.case_number,
                case.docket_status,
                case.applicant,
                case.county,
                case.legal_description,
                case.hearing_date.map(|dt| dt.to_rfc3339()),
                case.status.as_str(),
                case.attempt_count,
                case.last_attempt_at.map(|dt| dt.to_rfc3339()),
                case.next_retry_at.map(|dt| dt.to_rfc3339()),
                case.last_error,
                case.document_id,
                case.order_number,
                case.note,
                case.fetched_at.map(|dt| dt.to_rfc3339()),
                case.processed_at.map(|dt| dt.to_rfc3339()),
                case.created_at.to_rfc3339(),
                case.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a tracked case by case number.
    pub fn get_case(&self, case_number: &str) -> Result<Option<HarvestCase>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM harvest_cases WHERE case_number = ?")?;
        crate::repository::to_option(stmt.query_row(params![case_number], row_to_case))
    }

    /// Retry-eligible cases, most recent hearing date first: `no_order`
    /// rows whose backoff deadline has elapsed, and `error` rows with
    /// attempts remaining, which carry no deadline and go straight back
    /// into the next run.
    pub fn due_retries(
        &self,
        now: DateTime<Utc>,
        max_attempts: u32,
        limit: u32,
    ) -> Result<Vec<HarvestCase>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM harvest_cases
            WHERE attempt_count < ?
            AND (
                (status = 'no_order' AND next_retry_at IS NOT NULL AND next_retry_at <= ?)
                OR status = 'error'
            )
            ORDER BY hearing_date DESC
            LIMIT ?
            "#,
        )?;
        let cases = stmt
            .query_map(params![max_attempts, now.to_rfc3339(), limit], row_to_case)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cases)
    }

    /// Tracked cases left in a non-terminal pre-fetch state by an
    /// interrupted run (rate-limit abort, crash mid-case). These resume
    /// ahead of fresh discovery on the next sweep.
    pub fn stranded_cases(&self, limit: u32) -> Result<Vec<HarvestCase>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM harvest_cases
            WHERE status IN ('pending', 'fetching')
            ORDER BY hearing_date DESC
            LIMIT ?
            "#,
        )?;
        let cases = stmt
            .query_map(params![limit], row_to_case)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cases)
    }

    /// Cases in `fetched` awaiting downstream confirmation.
    pub fn fetched_cases(&self, limit: u32) -> Result<Vec<HarvestCase>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM harvest_cases
            WHERE status = 'fetched' AND document_id IS NOT NULL
            ORDER BY fetched_at ASC
            LIMIT ?
            "#,
        )?;
        let cases = stmt
            .query_map(params![limit], row_to_case)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cases)
    }

    /// Number of cases with a fetch attempt at or after `since`.
    ///
    /// This is the daily-cap accounting: attempts are counted by
    /// `last_attempt_at`, so an interrupted run still consumes budget.
    pub fn count_attempted_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM harvest_cases WHERE last_attempt_at >= ?",
            params![since.to_rfc3339()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Cases currently scheduled or due for retry.
    pub fn retry_queue_size(&self, max_attempts: u32) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            r#"
            SELECT COUNT(*) FROM harvest_cases
            WHERE attempt_count < ?
            AND (
                (status = 'no_order' AND next_retry_at IS NOT NULL)
                OR status = 'error'
            )
            "#,
            params![max_attempts],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HarvestStatus;
    use chrono::Duration;
    use tempfile::tempdir;

    fn repo() -> (tempfile::TempDir, HarvestRepository) {
        let dir = tempdir().unwrap();
        let repo = HarvestRepository::new(&dir.path().join("harvest.db")).unwrap();
        (dir, repo)
    }

    #[test]
    fn upsert_then_get_round_trips() {
        let (_dir, repo) = repo();
        let mut case = HarvestCase::new("CD 2025-002808".to_string());
        case.applicant = Some("Acme Operating".to_string());
        case.county = Some("KINGFISHER".to_string());
        repo.upsert_case(&case).unwrap();

        let loaded = repo.get_case("CD 2025-002808").unwrap().unwrap();
        assert_eq!(loaded.status, HarvestStatus::Pending);
        assert_eq!(loaded.applicant.as_deref(), Some("Acme Operating"));
    }

    #[test]
    fn upsert_never_clears_document_id() {
        let (_dir, repo) = repo();
        let mut case = HarvestCase::new("CD 2025-000001".to_string());
        case.mark_fetching(Utc::now());
        case.mark_fetched("doc-42".to_string(), None);
        repo.upsert_case(&case).unwrap();

        // A later write without the id must not clobber it.
        let mut stale = repo.get_case("CD 2025-000001").unwrap().unwrap();
        stale.document_id = None;
        repo.upsert_case(&stale).unwrap();

        let loaded = repo.get_case("CD 2025-000001").unwrap().unwrap();
        assert_eq!(loaded.document_id.as_deref(), Some("doc-42"));
    }

    #[test]
    fn upsert_keeps_max_attempt_count() {
        let (_dir, repo) = repo();
        let now = Utc::now();
        let mut case = HarvestCase::new("CD 2025-000002".to_string());
        case.mark_fetching(now);
        case.mark_fetching(now);
        repo.upsert_case(&case).unwrap();

        let mut stale = case.clone();
        stale.attempt_count = 1;
        repo.upsert_case(&stale).unwrap();

        let loaded = repo.get_case("CD 2025-000002").unwrap().unwrap();
        assert_eq!(loaded.attempt_count, 2);
    }

    #[test]
    fn due_retries_honors_deadline_and_order() {
        let (_dir, repo) = repo();
        let now = Utc::now();

        let mut due = HarvestCase::new("CD 2025-000010".to_string());
        due.hearing_date = Some(now - Duration::days(30));
        due.mark_fetching(now - Duration::days(10));
        due.mark_no_order(now - Duration::days(10), 3, 5);
        repo.upsert_case(&due).unwrap();

        let mut newer = HarvestCase::new("CD 2025-000011".to_string());
        newer.hearing_date = Some(now - Duration::days(5));
        newer.mark_fetching(now - Duration::days(4));
        newer.mark_no_order(now - Duration::days(4), 3, 5);
        repo.upsert_case(&newer).unwrap();

        let mut not_due = HarvestCase::new("CD 2025-000012".to_string());
        not_due.mark_fetching(now);
        not_due.mark_no_order(now, 3, 5);
        repo.upsert_case(&not_due).unwrap();

        let retries = repo.due_retries(now, 5, 10).unwrap();
        let numbers: Vec<_> = retries.iter().map(|c| c.case_number.as_str()).collect();
        assert_eq!(numbers, vec!["CD 2025-000011", "CD 2025-000010"]);
    }

    #[test]
    fn due_retries_picks_up_errors_with_attempts_remaining() {
        let (_dir, repo) = repo();
        let now = Utc::now();

        let mut failed = HarvestCase::new("CD 2025-000030".to_string());
        failed.mark_fetching(now);
        failed.mark_error("portal returned 500");
        repo.upsert_case(&failed).unwrap();

        let mut exhausted = HarvestCase::new("CD 2025-000031".to_string());
        for _ in 0..5 {
            exhausted.mark_fetching(now);
        }
        exhausted.mark_error("portal returned 500");
        repo.upsert_case(&exhausted).unwrap();

        // Errors carry no backoff deadline and are due right away.
        let retries = repo.due_retries(now, 5, 10).unwrap();
        let numbers: Vec<_> = retries.iter().map(|c| c.case_number.as_str()).collect();
        assert_eq!(numbers, vec!["CD 2025-000030"]);
        assert_eq!(repo.retry_queue_size(5).unwrap(), 1);
    }

    #[test]
    fn attempted_since_counts_only_recent() {
        let (_dir, repo) = repo();
        let now = Utc::now();

        let mut old = HarvestCase::new("CD 2024-000001".to_string());
        old.mark_fetching(now - Duration::days(2));
        repo.upsert_case(&old).unwrap();

        let mut recent = HarvestCase::new("CD 2025-000020".to_string());
        recent.mark_fetching(now);
        repo.upsert_case(&recent).unwrap();

        let count = repo.count_attempted_since(now - Duration::hours(24)).unwrap();
        assert_eq!(count, 1);
    }
}
