//! Harvest tracking store: per-case harvest state and daily aggregates.

mod case;
mod helpers;
mod stats;

use std::path::{Path, PathBuf};

use rusqlite::Connection;

use super::Result;

/// SQLite-backed repository for harvest state.
pub struct HarvestRepository {
    db_path: PathBuf,
}

impl HarvestRepository {
    /// Create a new harvest repository, initializing the schema.
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    pub(crate) fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            -- One row per regulatory case ever discovered. Never deleted.
            CREATE TABLE IF NOT EXISTS harvest_cases (
                case_number TEXT PRIMARY KEY,
                docket_status TEXT,
                applicant TEXT,
                county TEXT,
                legal_description TEXT,
                hearing_date TEXT,

                status TEXT NOT NULL DEFAULT 'pending',

                -- Attempt tracking
                attempt_count INTEGER NOT NULL DEFAULT 0,
                last_attempt_at TEXT,
                next_retry_at TEXT,
                last_error TEXT,

                -- Downstream linkage
                document_id TEXT,
                order_number TEXT,
                note TEXT,

                fetched_at TEXT,
                processed_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_harvest_cases_status
                ON harvest_cases(status);
            CREATE INDEX IF NOT EXISTS idx_harvest_cases_retry
                ON harvest_cases(status, next_retry_at);
            CREATE INDEX IF NOT EXISTS idx_harvest_cases_attempted
                ON harvest_cases(last_attempt_at);

            -- Additive per-day aggregates. Never overwritten.
            CREATE TABLE IF NOT EXISTS daily_stats (
                date TEXT PRIMARY KEY,
                cases_checked INTEGER NOT NULL DEFAULT 0,
                orders_found INTEGER NOT NULL DEFAULT 0,
                no_order INTEGER NOT NULL DEFAULT 0,
                errors INTEGER NOT NULL DEFAULT 0,
                retries INTEGER NOT NULL DEFAULT 0,
                runs INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )?;
        Ok(())
    }
}
