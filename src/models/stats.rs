//! Aggregate statistics models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Additive per-day aggregate of sweep activity.
///
/// Created lazily on first write for a date and only ever incremented;
/// every run that touches a date adds to the same row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyStat {
    pub date: NaiveDate,
    pub cases_checked: u64,
    pub orders_found: u64,
    pub no_order: u64,
    pub errors: u64,
    pub retries: u64,
    pub runs: u64,
}

impl DailyStat {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            cases_checked: 0,
            orders_found: 0,
            no_order: 0,
            errors: 0,
            retries: 0,
            runs: 0,
        }
    }
}

/// Counts by harvest status.
pub type StatusTotals = HashMap<String, u64>;

/// How a sweep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStop {
    /// All selected candidates were processed.
    Completed,
    /// No budget remained for today.
    BudgetExhausted,
    /// The wall-clock safety margin was reached.
    TimeBudget,
    /// The portal signaled throttling; the run aborted immediately.
    RateLimited,
    /// Five consecutive non-rate-limit errors tripped the breaker.
    CircuitBreaker,
}

/// Summary of one sweep, logged at run end and returned from /trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepOutcome {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub checked: u64,
    pub fetched: u64,
    pub no_order: u64,
    pub errors: u64,
    pub skipped: u64,
    pub retries_attempted: u64,
    pub reconciled: u64,
    pub stopped: SweepStop,
}

impl SweepOutcome {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            checked: 0,
            fetched: 0,
            no_order: 0,
            errors: 0,
            skipped: 0,
            retries_attempted: 0,
            reconciled: 0,
            stopped: SweepStop::Completed,
        }
    }
}

/// Aggregate report served by /stats and the `stats` CLI command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestReport {
    /// Tracked case counts by harvest status.
    pub totals_by_status: StatusTotals,
    /// Tracked case counts by county.
    pub by_county: HashMap<String, u64>,
    /// Trailing daily stats, most recent first.
    pub daily: Vec<DailyStat>,
    /// Tracked cases with a registered downstream document.
    pub with_document: u64,
    /// Untracked eligible docket cases awaiting first discovery.
    pub backlog: u64,
    /// Cases currently due or scheduled for retry.
    pub retry_queue: u64,
}
