use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::stats))
        .route("/trigger", post(handlers::trigger_sweep))
        .route("/trigger-backfill", post(handlers::trigger_backfill))
        .route("/test", post(handlers::test_case))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::config::HarvestSettings;
    use crate::harvest::Harvester;
    use crate::pipeline::{FsObjectStore, HttpPipeline, PipelineConfig};
    use crate::portal::laserfiche::WeblinkConfig;
    use crate::portal::wellfiles::WellFilesConfig;
    use crate::portal::{SessionCache, WeblinkClient, WellFilesClient};
    use crate::repository::{DocketRepository, HarvestRepository};

    fn app(dir: &Path) -> Router {
        let db = dir.join("harvest.db");
        let sessions = SessionCache::new();
        let harvester = Harvester::new(
            Arc::new(HarvestRepository::new(&db).unwrap()),
            Arc::new(DocketRepository::new(&db).unwrap()),
            Arc::new(WeblinkClient::new(WeblinkConfig::default(), sessions.clone()).unwrap()),
            Arc::new(WellFilesClient::new(WellFilesConfig::default(), sessions).unwrap()),
            Arc::new(HttpPipeline::new(PipelineConfig::default()).unwrap()),
            Arc::new(FsObjectStore::new(&dir.join("objects"))),
            "test-user".to_string(),
            HarvestSettings::default(),
        );
        create_router(AppState::new(Arc::new(harvester)))
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn stats_works_on_an_empty_database() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_endpoint_rejects_malformed_case_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::post("/test")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"case_number": "not-a-case"}"#))
            .unwrap();
        let response = app(dir.path()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
