//! Row mapping helpers for the harvest repository.

use rusqlite::Row;

use crate::models::{HarvestCase, HarvestStatus};
use crate::repository::parse_datetime;

/// Map a `SELECT * FROM harvest_cases` row to a `HarvestCase`.
pub(crate) fn row_to_case(row: &Row<'_>) -> rusqlite::Result<HarvestCase> {
    let status: String = row.get("status")?;
    Ok(HarvestCase {
        case_number: row.get("case_number")?,
        docket_status: row.get("docket_status")?,
        applicant: row.get("applicant")?,
        county: row.get("county")?,
        legal_description: row.get("legal_description")?,
        hearing_date: row
            .get::<_, Option<String>>("hearing_date")?
            .map(|s| parse_datetime(&s)),
        status: HarvestStatus::from_str(&status).unwrap_or(HarvestStatus::Pending),
        attempt_count: row.get::<_, i64>("attempt_count")? as u32,
        last_attempt_at: row
            .get::<_, Option<String>>("last_attempt_at")?
            .map(|s| parse_datetime(&s)),
        next_retry_at: row
            .get::<_, Option<String>>("next_retry_at")?
            .map(|s| parse_datetime(&s)),
        last_error: row.get("last_error")?,
        document_id: row.get("document_id")?,
        order_number: row.get("order_number")?,
        note: row.get("note")?,
        fetched_at: row
            .get::<_, Option<String>>("fetched_at")?
            .map(|s| parse_datetime(&s)),
        processed_at: row
            .get::<_, Option<String>>("processed_at")?
            .map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(&row.get::<_, String>("updated_at")?),
    })
}
