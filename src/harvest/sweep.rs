//! Sweep execution: budgeting, candidate selection, pacing, and the
//! stop conditions.

use std::time::Instant;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use tokio::time::Duration;
use tracing::{info, warn};

use super::process::CaseOutcome;
use super::Harvester;
use crate::models::{DailyStat, HarvestCase, SweepOutcome, SweepStop};

/// Retry work gets this share of the remaining daily budget; new cases
/// get the remainder.
const RETRY_SHARE_PERCENT: u64 = 30;

/// Split a remaining daily budget into (retry, new) allotments, each
/// additionally capped by the per-run batch size.
pub(crate) fn split_budget(remaining: u64, batch_size: u32) -> (u64, u64) {
    let retry = remaining * RETRY_SHARE_PERCENT / 100;
    let new = remaining - retry;
    (retry.min(batch_size as u64), new.min(batch_size as u64))
}

/// One selected candidate and whether it consumes the retry budget.
struct Candidate {
    case: HarvestCase,
    is_retry: bool,
}

impl Harvester {
    /// Run one harvest sweep. Never panics the scheduler: per-case
    /// failures are recorded and the run presses on until a stop
    /// condition fires.
    pub async fn run_sweep(&self) -> anyhow::Result<SweepOutcome> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut outcome = SweepOutcome::new(run_id.clone());
        let started = Instant::now();
        let now = Utc::now();

        info!(run_id, "sweep started");

        outcome.reconciled = self.reconcile_fetched().await;

        let attempted_today = self
            .harvest
            .count_attempted_since(now - ChronoDuration::hours(24))?;
        let remaining = (self.config.daily_cap as u64).saturating_sub(attempted_today);
        if remaining == 0 {
            info!(run_id, attempted_today, "daily cap reached; nothing to do");
            outcome.stopped = SweepStop::BudgetExhausted;
            self.persist_stats(&outcome)?;
            return Ok(outcome);
        }

        let (retry_budget, new_budget) = split_budget(remaining, self.config.batch_size);
        let candidates = self.select_candidates(now, retry_budget, new_budget, None)?;
        info!(
            run_id,
            remaining,
            retry_budget,
            new_budget,
            selected = candidates.len(),
            "candidates selected"
        );

        self.process_candidates(candidates, started, &mut outcome)
            .await;
        self.persist_stats(&outcome)?;

        info!(
            run_id,
            checked = outcome.checked,
            fetched = outcome.fetched,
            no_order = outcome.no_order,
            errors = outcome.errors,
            skipped = outcome.skipped,
            stopped = ?outcome.stopped,
            "sweep finished"
        );
        Ok(outcome)
    }

    /// Backfill over historical untracked cases, bounded by a minimum
    /// hearing date and a limit instead of the daily cap's date boundary.
    pub async fn run_backfill(
        &self,
        min_hearing_date: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<SweepOutcome> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut outcome = SweepOutcome::new(run_id.clone());
        let started = Instant::now();

        let statuses: Vec<&str> = self
            .config
            .docket_statuses
            .iter()
            .map(|s| s.as_str())
            .collect();
        let discovered = self.docket.untracked_candidates(
            &self.config.filing_type,
            &statuses,
            Some(min_hearing_date),
            limit,
        )?;
        info!(run_id, count = discovered.len(), %min_hearing_date, "backfill candidates");

        let candidates = discovered
            .iter()
            .map(|d| Candidate {
                case: Self::case_from_docket(d),
                is_retry: false,
            })
            .collect();

        self.process_candidates(candidates, started, &mut outcome)
            .await;
        self.persist_stats(&outcome)?;
        Ok(outcome)
    }

    /// Select retry-eligible cases, stranded cases from interrupted runs,
    /// then fresh docket candidates, within the given budgets.
    fn select_candidates(
        &self,
        now: DateTime<Utc>,
        retry_budget: u64,
        new_budget: u64,
        min_hearing_date: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<Candidate>> {
        let mut candidates = Vec::new();

        for case in self
            .harvest
            .due_retries(now, self.config.max_attempts, retry_budget as u32)?
        {
            candidates.push(Candidate {
                case,
                is_retry: true,
            });
        }

        let mut new_slots = new_budget;
        for case in self.harvest.stranded_cases(new_slots as u32)? {
            candidates.push(Candidate {
                case,
                is_retry: false,
            });
            new_slots = new_slots.saturating_sub(1);
        }

        if new_slots > 0 {
            let statuses: Vec<&str> = self
                .config
                .docket_statuses
                .iter()
                .map(|s| s.as_str())
                .collect();
            let discovered = self.docket.untracked_candidates(
                &self.config.filing_type,
                &statuses,
                min_hearing_date,
                new_slots as u32,
            )?;
            for docket in &discovered {
                candidates.push(Candidate {
                    case: Self::case_from_docket(docket),
                    is_retry: false,
                });
            }
        }

        Ok(candidates)
    }

    /// The sequential processing loop with all three stop conditions.
    async fn process_candidates(
        &self,
        candidates: Vec<Candidate>,
        started: Instant,
        outcome: &mut SweepOutcome,
    ) {
        let mut consecutive_errors = 0u32;
        let total = candidates.len();

        for (index, mut candidate) in candidates.into_iter().enumerate() {
            if started.elapsed() >= self.config.time_budget() {
                warn!(
                    processed = index,
                    total, "time budget reached; persisting partial progress"
                );
                outcome.stopped = SweepStop::TimeBudget;
                break;
            }

            let case_outcome = self.process_case(&mut candidate.case).await;
            if candidate.is_retry && case_outcome != CaseOutcome::RateLimited {
                outcome.retries_attempted += 1;
            }

            match case_outcome {
                CaseOutcome::Fetched { .. } => {
                    outcome.checked += 1;
                    outcome.fetched += 1;
                    consecutive_errors = 0;
                }
                CaseOutcome::NoOrder => {
                    outcome.checked += 1;
                    outcome.no_order += 1;
                    consecutive_errors = 0;
                }
                CaseOutcome::Skipped { .. } => {
                    outcome.checked += 1;
                    outcome.skipped += 1;
                    consecutive_errors = 0;
                }
                CaseOutcome::RateLimited => {
                    // Not counted as an error; the portal asked us to go
                    // away, so the whole run goes away.
                    warn!("rate limit signal; aborting sweep");
                    outcome.stopped = SweepStop::RateLimited;
                    break;
                }
                CaseOutcome::Failed { message } => {
                    outcome.checked += 1;
                    outcome.errors += 1;
                    consecutive_errors += 1;
                    warn!(
                        case_number = %candidate.case.case_number,
                        consecutive_errors,
                        message,
                        "case failed"
                    );
                    if consecutive_errors >= self.config.circuit_breaker_threshold {
                        warn!("circuit breaker tripped; aborting sweep");
                        outcome.stopped = SweepStop::CircuitBreaker;
                        break;
                    }
                }
            }

            if index + 1 < total {
                tokio::time::sleep(self.inter_case_delay()).await;
            }
        }
    }

    /// Base delay plus random jitter, so request timing never forms a
    /// predictable pattern.
    fn inter_case_delay(&self) -> Duration {
        let jitter = if self.config.jitter_ms > 0 {
            rand::rng().random_range(0..=self.config.jitter_ms)
        } else {
            0
        };
        self.config.base_delay() + Duration::from_millis(jitter)
    }

    /// Add this run's tallies to today's aggregate row, whatever way the
    /// run ended.
    fn persist_stats(&self, outcome: &SweepOutcome) -> anyhow::Result<()> {
        let mut delta = DailyStat::empty(Utc::now().date_naive());
        delta.cases_checked = outcome.checked;
        delta.orders_found = outcome.fetched;
        delta.no_order = outcome.no_order;
        delta.errors = outcome.errors;
        delta.retries = outcome.retries_attempted;
        delta.runs = 1;
        self.harvest.add_daily_stat(&delta)?;
        Ok(())
    }
}
