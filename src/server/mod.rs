//! The HTTP API. Each request runs its own fetch cycle against the connector; nothing is cached.

mod error;

use crate::api::Connector;
use crate::commands;
use crate::model::{BillEntry, MonthlyAggregate, PeriodSums};
use crate::Config;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    connector: Arc<dyn Connector>,
}

impl AppState {
    pub fn new(config: Arc<Config>, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/common", get(common))
        .route("/api/sum", get(sum))
        .route("/api/monthly", get(monthly))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bill entries of all order sheets.
async fn common(State(state): State<AppState>) -> Result<Json<Vec<BillEntry>>, ApiError> {
    let out = commands::common(state.connector.as_ref(), &state.config).await?;
    Ok(Json(out.into_structure().unwrap_or_default()))
}

/// Totals per period label.
async fn sum(State(state): State<AppState>) -> Result<Json<PeriodSums>, ApiError> {
    let out = commands::sum(state.connector.as_ref(), &state.config).await?;
    Ok(Json(out.into_structure().unwrap_or_default()))
}

/// Totals per calendar month, for the spending chart.
async fn monthly(State(state): State<AppState>) -> Result<Json<Vec<MonthlyAggregate>>, ApiError> {
    let out = commands::monthly(state.connector.as_ref(), &state.config).await?;
    Ok(Json(out.into_structure().unwrap_or_default()))
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MemoryConnector, MemorySheet};
    use crate::args::SourceArgs;
    use crate::model::CellRef;
    use crate::test::test_config;
    use crate::{Error, Mode};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router(connector: MemoryConnector) -> Router {
        build_router(AppState::new(
            Arc::new(test_config()),
            Arc::new(connector),
        ))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_common() {
        let (status, body) = get_json(router(MemoryConnector::default()), "/api/common").await;
        assert_eq!(status, StatusCode::OK);
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 6);
        assert_eq!(
            entries[0],
            json!({
                "index": "1",
                "name": "An",
                "totalAmount": 40000,
                "dishName": "Phở bò",
                "sheetName": "04/03",
                "sheetUrl": "https://docs.google.com/spreadsheets/d/test-sheet/edit?gid=201562877",
                "date": "04/03/2024",
            })
        );
    }

    #[tokio::test]
    async fn test_sum() {
        let (status, body) = get_json(router(MemoryConnector::default()), "/api/sum").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "04/03/2024": 75000, "15/03/2024": 95000, "02/04/2024": 80000 })
        );
    }

    #[tokio::test]
    async fn test_sum_shared_label() {
        let total = CellRef::new(22, 5);
        let label = CellRef::new(0, 7);
        let connector = MemoryConnector::new(vec![
            MemorySheet::new("Hướng dẫn", 0, [[""]]),
            MemorySheet::new("Tháng 3 (1)", 1, [[""]])
                .with_cell(label, "03/2024")
                .with_cell(total, "100,000"),
            MemorySheet::new("Tháng 3 (2)", 2, [[""]])
                .with_cell(label, "03/2024")
                .with_cell(total, "50,000"),
        ]);
        let (status, body) = get_json(router(connector), "/api/sum").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "03/2024": 150000 }));
    }

    #[tokio::test]
    async fn test_monthly() {
        let (status, body) = get_json(router(MemoryConnector::default()), "/api/monthly").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([
                { "month": "03/2024", "totalAmount": 170000 },
                { "month": "04/2024", "totalAmount": 80000 },
            ])
        );
    }

    #[tokio::test]
    async fn test_unavailable_source_is_generic_500() {
        let connector = MemoryConnector::default();
        connector.set_unavailable(true);
        for uri in ["/api/common", "/api/sum", "/api/monthly"] {
            let (status, body) = get_json(router(connector.clone()), uri).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, json!({ "error": "An error occurred" }));
        }
    }

    #[tokio::test]
    async fn test_failing_sheet_fails_whole_request() {
        let connector = MemoryConnector::default();
        connector.fail_loading("02/04");
        let (status, body) = get_json(router(connector), "/api/common").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "An error occurred" }));
    }

    #[tokio::test]
    async fn test_config_error_is_described() {
        let response = ApiError::from(Error::config(
            "Missing required environment variables: GOOGLE_SHEET_ID",
        ))
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            json!({ "error": "Missing required environment variables: GOOGLE_SHEET_ID" })
        );
    }

    #[tokio::test]
    async fn test_offsets_apply_to_requests() {
        let args = SourceArgs::new(None, None, None).with_offsets(4, 5);
        let config = Config::new(&args, Mode::Test).unwrap();
        let app = build_router(AppState::new(
            Arc::new(config),
            Arc::new(MemoryConnector::default()),
        ));
        let (_, body) = get_json(app.clone(), "/api/common").await;
        assert_eq!(body.as_array().unwrap().len(), 4);
        let (_, body) = get_json(app, "/api/sum").await;
        assert_eq!(body, json!({ "02/04/2024": 80000 }));
    }

    #[tokio::test]
    async fn test_health() {
        let response = router(MemoryConnector::default())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"ok");
    }
}
