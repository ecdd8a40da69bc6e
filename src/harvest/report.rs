//! Aggregate statistics assembly for /stats and the CLI.

use super::Harvester;
use crate::models::HarvestReport;

/// Days of trailing daily stats included in the report.
const TRAILING_DAYS: u32 = 7;

impl Harvester {
    /// Build the aggregate report: totals by status, county breakdown,
    /// trailing daily stats, coverage, backlog, and retry-queue size.
    pub fn harvest_report(&self) -> anyhow::Result<HarvestReport> {
        let statuses: Vec<&str> = self
            .config
            .docket_statuses
            .iter()
            .map(|s| s.as_str())
            .collect();

        Ok(HarvestReport {
            totals_by_status: self.harvest.totals_by_status()?,
            by_county: self.harvest.totals_by_county()?,
            daily: self.harvest.recent_daily_stats(TRAILING_DAYS)?,
            with_document: self.harvest.with_document_count()?,
            backlog: self
                .docket
                .backlog_count(&self.config.filing_type, &statuses)?,
            retry_queue: self.harvest.retry_queue_size(self.config.max_attempts)?,
        })
    }
}
