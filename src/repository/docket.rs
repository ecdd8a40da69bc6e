//! Discovery queries over the upstream docket feed.
//!
//! The docket table is populated by an external filing monitor; this
//! repository only reads it (plus one ingest insert shared by the feed
//! adapter and the test suite). Discovery joins against `harvest_cases`
//! in the same database to find never-tracked candidates.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::{parse_datetime, Result};
use crate::models::DocketCase;

/// Read-side interface to the upstream docket table.
pub struct DocketRepository {
    db_path: PathBuf,
}

impl DocketRepository {
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS docket_cases (
                case_number TEXT PRIMARY KEY,
                filing_type TEXT NOT NULL,
                status TEXT NOT NULL,
                applicant TEXT,
                county TEXT,
                legal_description TEXT,
                hearing_date TEXT,
                well_id TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_docket_cases_type_status
                ON docket_cases(filing_type, status);
            "#,
        )?;
        Ok(())
    }

    /// Insert or refresh a docket row (the feed's write path).
    pub fn ingest_case(&self, case: &DocketCase) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO docket_cases (
                case_number, filing_type, status, applicant, county,
                legal_description, hearing_date, well_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(case_number) DO UPDATE SET
                filing_type = excluded.filing_type,
                status = excluded.status,
                applicant = COALESCE(excluded.applicant, applicant),
                county = COALESCE(excluded.county, county),
                legal_description = COALESCE(excluded.legal_description, legal_description),
                hearing_date = COALESCE(excluded.hearing_date, hearing_date),
                well_id = COALESCE(excluded.well_id, well_id)
            "#,
            params![
                case.case_number,
                case.filing_type,
                case.status,
                case.applicant,
                case.county,
                case.legal_description,
                case.hearing_date.map(|dt| dt.to_rfc3339()),
                case.well_id,
            ],
        )?;
        Ok(())
    }

    /// Get one docket row.
    pub fn get_case(&self, case_number: &str) -> Result<Option<DocketCase>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM docket_cases WHERE case_number = ?")?;
        super::to_option(stmt.query_row(params![case_number], row_to_docket))
    }

    /// Candidate cases never tracked by the harvester, most recent hearing
    /// date first. `min_hearing_date` bounds backfill sweeps; ordinary
    /// discovery passes `None`.
    pub fn untracked_candidates(
        &self,
        filing_type: &str,
        statuses: &[&str],
        min_hearing_date: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<DocketCase>> {
        let conn = self.connect()?;
        let status_list = status_in_clause(statuses);
        let sql = format!(
            r#"
            SELECT d.* FROM docket_cases d
            WHERE d.filing_type = ?1
            AND d.status IN ({status_list})
            AND (?2 IS NULL OR d.hearing_date >= ?2)
            AND NOT EXISTS (
                SELECT 1 FROM harvest_cases h
                WHERE h.case_number = d.case_number
            )
            ORDER BY d.hearing_date DESC
            LIMIT ?3
            "#,
        );
        let mut stmt = conn.prepare(&sql)?;
        let cases = stmt
            .query_map(
                params![
                    filing_type,
                    min_hearing_date.map(|dt| dt.to_rfc3339()),
                    limit
                ],
                row_to_docket,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cases)
    }

    /// Size of the untracked eligible backlog.
    pub fn backlog_count(&self, filing_type: &str, statuses: &[&str]) -> Result<u64> {
        let conn = self.connect()?;
        let status_list = status_in_clause(statuses);
        let sql = format!(
            r#"
            SELECT COUNT(*) FROM docket_cases d
            WHERE d.filing_type = ?1
            AND d.status IN ({status_list})
            AND NOT EXISTS (
                SELECT 1 FROM harvest_cases h
                WHERE h.case_number = d.case_number
            )
            "#,
        );
        let count: i64 = conn.query_row(&sql, params![filing_type], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Quote a status list for an IN clause. Statuses come from configuration,
/// not user input, but quotes are escaped anyway.
fn status_in_clause(statuses: &[&str]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ")
}

fn row_to_docket(row: &Row<'_>) -> rusqlite::Result<DocketCase> {
    Ok(DocketCase {
        case_number: row.get("case_number")?,
        filing_type: row.get("filing_type")?,
        status: row.get("status")?,
        applicant: row.get("applicant")?,
        county: row.get("county")?,
        legal_description: row.get("legal_description")?,
        hearing_date: row
            .get::<_, Option<String>>("hearing_date")?
            .map(|s| parse_datetime(&s)),
        well_id: row.get("well_id")?,
    })
}
