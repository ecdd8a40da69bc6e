use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use crate::harvest::CaseOutcome;

use super::AppState;

/// Backfills triggered over HTTP are bounded regardless of what the
/// caller asks for.
const BACKFILL_LIMIT_CAP: u32 = 200;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "regharvest",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let report = state.harvester.harvest_report().map_err(|e| {
        error!(error = %e, "stats report failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(json!(report)))
}

pub async fn trigger_sweep(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let _guard = state.sweep_lock.lock().await;
    let outcome = state.harvester.run_sweep().await.map_err(|e| {
        error!(error = %e, "triggered sweep failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(json!({ "sweep": outcome })))
}

#[derive(Debug, Deserialize)]
pub struct BackfillRequest {
    pub min_hearing_date: NaiveDate,
    pub limit: Option<u32>,
}

pub async fn trigger_backfill(
    State(state): State<AppState>,
    Json(req): Json<BackfillRequest>,
) -> Result<Json<Value>, StatusCode> {
    let limit = req.limit.unwrap_or(BACKFILL_LIMIT_CAP).min(BACKFILL_LIMIT_CAP);
    let min_hearing: DateTime<Utc> = req
        .min_hearing_date
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or(StatusCode::BAD_REQUEST)?;

    let _guard = state.sweep_lock.lock().await;
    let outcome = state
        .harvester
        .run_backfill(min_hearing, limit)
        .await
        .map_err(|e| {
            error!(error = %e, "triggered backfill failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(json!({ "sweep": outcome, "limit": limit })))
}

#[derive(Debug, Deserialize)]
pub struct TestRequest {
    pub case_number: String,
}

pub async fn test_case(
    State(state): State<AppState>,
    Json(req): Json<TestRequest>,
) -> Result<Json<Value>, StatusCode> {
    let case_number = req.case_number.trim();
    if !crate::utils::is_case_number(case_number) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let _guard = state.sweep_lock.lock().await;
    let outcome = state
        .harvester
        .process_single(case_number)
        .await
        .map_err(|e| {
            error!(case_number, error = %e, "single-case test failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let body = match outcome {
        CaseOutcome::Fetched { document_id } => {
            json!({ "result": "fetched", "document_id": document_id })
        }
        CaseOutcome::NoOrder => json!({ "result": "no_order" }),
        CaseOutcome::Skipped { document_id } => {
            json!({ "result": "skipped", "document_id": document_id })
        }
        CaseOutcome::RateLimited => json!({ "result": "rate_limited" }),
        CaseOutcome::Failed { message } => json!({ "result": "error", "message": message }),
    };
    Ok(Json(body))
}
