//! Daily aggregates and reporting queries.

use chrono::NaiveDate;
use rusqlite::params;
use std::collections::HashMap;

use super::HarvestRepository;
use crate::models::{DailyStat, StatusTotals};
use crate::repository::Result;

impl HarvestRepository {
    /// Add a delta to a date's aggregate row, creating it on first write.
    pub fn add_daily_stat(&self, delta: &DailyStat) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO daily_stats (date, cases_checked, orders_found, no_order, errors, retries, runs)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(date) DO UPDATE SET
                cases_checked = cases_checked + excluded.cases_checked,
                orders_found = orders_found + excluded.orders_found,
                no_order = no_order + excluded.no_order,
                errors = errors + excluded.errors,
                retries = retries + excluded.retries,
                runs = runs + excluded.runs
            "#,
            params![
                delta.date.format("%Y-%m-%d").to_string(),
                delta.cases_checked,
                delta.orders_found,
                delta.no_order,
                delta.errors,
                delta.retries,
                delta.runs,
            ],
        )?;
        Ok(())
    }

    /// Get one date's aggregate, if any run touched it.
    pub fn get_daily_stat(&self, date: NaiveDate) -> Result<Option<DailyStat>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM daily_stats WHERE date = ?")?;
        crate::repository::to_option(stmt.query_row(
            params![date.format("%Y-%m-%d").to_string()],
            row_to_daily,
        ))
    }

    /// Trailing daily stats, most recent first.
    pub fn recent_daily_stats(&self, days: u32) -> Result<Vec<DailyStat>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT * FROM daily_stats ORDER BY date DESC LIMIT ?")?;
        let stats = stmt
            .query_map(params![days], row_to_daily)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stats)
    }

    /// Tracked case counts grouped by harvest status.
    pub fn totals_by_status(&self) -> Result<StatusTotals> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM harvest_cases GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut totals = HashMap::new();
        for row in rows {
            let (status, count) = row?;
            totals.insert(status, count);
        }
        Ok(totals)
    }

    /// Tracked case counts grouped by county.
    pub fn totals_by_county(&self) -> Result<HashMap<String, u64>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT COALESCE(county, 'UNKNOWN'), COUNT(*)
            FROM harvest_cases
            GROUP BY COALESCE(county, 'UNKNOWN')
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut totals = HashMap::new();
        for row in rows {
            let (county, count) = row?;
            totals.insert(county, count);
        }
        Ok(totals)
    }

    /// Tracked cases holding a registered downstream document id.
    pub fn with_document_count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM harvest_cases WHERE document_id IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn row_to_daily(row: &rusqlite::Row<'_>) -> rusqlite::Result<DailyStat> {
    let date: String = row.get("date")?;
    Ok(DailyStat {
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .unwrap_or(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()),
        cases_checked: row.get::<_, i64>("cases_checked")? as u64,
        orders_found: row.get::<_, i64>("orders_found")? as u64,
        no_order: row.get::<_, i64>("no_order")? as u64,
        errors: row.get::<_, i64>("errors")? as u64,
        retries: row.get::<_, i64>("retries")? as u64,
        runs: row.get::<_, i64>("runs")? as u64,
    })
}
