//! The thin HTTP edge (spec.md §6): `initialize`, `query`, and `status`,
//! plus a `/health` liveness probe. Grounded on the `axum`/`tower-http`
//! stack named in this crate's manifest (no demo crate in the teacher repo
//! runs a server; the router shape follows the conventional `axum` 0.7
//! `State<Arc<_>>` pattern the other example repos in this retrieval pack
//! use for their own HTTP edges).
//!
//! Every route here is a direct pass-through to [`crate::pipeline::Pipeline`]
//! — request parsing and response shaping only. Per spec.md §1, the HTTP
//! surface is specified only where it touches the core; routes spec.md §6
//! lists as external (history, formula helper, speech-to-text) are not
//! implemented here.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::error::{AppError, AppResult};
use crate::pipeline::Pipeline;

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/initialize", post(initialize))
        .route("/query", post(query))
        .with_state(pipeline)
        .layer(TraceLayer::new_for_http())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
struct StatusResponse {
    chunks_loaded: usize,
    has_index: bool,
}

async fn status(State(pipeline): State<Arc<Pipeline>>) -> Json<StatusResponse> {
    let status = pipeline.status();
    Json(StatusResponse {
        chunks_loaded: status.chunks_loaded,
        has_index: status.has_index,
    })
}

#[derive(Deserialize)]
struct InitializeRequest {
    path: String,
}

#[derive(Serialize)]
struct InitializeResponse {
    snippet_count: usize,
}

async fn initialize(
    State(pipeline): State<Arc<Pipeline>>,
    Json(request): Json<InitializeRequest>,
) -> AppResult<Json<InitializeResponse>> {
    if request.path.trim().is_empty() {
        return Err(AppError::InvalidInput("missing path".to_string()));
    }
    let snippet_count = pipeline.initialize(&request.path).await?;
    Ok(Json(InitializeResponse { snippet_count }))
}

#[derive(Deserialize)]
struct QueryRequest {
    prompt: String,
    #[serde(default)]
    detailed: bool,
    k: Option<usize>,
    #[serde(default)]
    snippets: Vec<String>,
    session_id: Option<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    snippets: Vec<String>,
}

async fn query(
    State(pipeline): State<Arc<Pipeline>>,
    Json(request): Json<QueryRequest>,
) -> AppResult<Json<QueryResponse>> {
    if request.prompt.trim().is_empty() {
        return Err(AppError::InvalidInput("missing prompt".to_string()));
    }
    let outcome = pipeline
        .query(
            &request.prompt,
            request.detailed,
            request.k,
            request.session_id.as_deref(),
            &request.snippets,
        )
        .await?;
    Ok(Json(QueryResponse {
        answer: outcome.answer,
        snippets: outcome.snippets,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::generator::fakes::FakeGenerator;
    use crate::generator::Generator;
    use crate::retrieval::embeddings::fakes::FakeEmbedder;
    use crate::worker_pool::WorkerPool;
    use crate::workbook::{SheetData, WorkbookReader};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct FixedWorkbookReader(Vec<SheetData>);
    impl WorkbookReader for FixedWorkbookReader {
        fn read(&self, _path: &std::path::Path) -> AppResult<Vec<SheetData>> {
            Ok(self.0.clone())
        }
    }

    fn test_pipeline() -> Arc<Pipeline> {
        let config = AppConfig {
            answerability_threshold: 0.0,
            evidence_overlap_threshold: 0.0,
            log_jsonl: std::env::temp_dir()
                .join(format!("tablerag-http-test-{}.jsonl", uuid::Uuid::new_v4()))
                .to_string_lossy()
                .to_string(),
            ..AppConfig::default()
        };
        let sheets = vec![SheetData {
            name: "Sales".to_string(),
            columns: vec!["Product".to_string(), "Revenue".to_string()],
            rows: vec![vec!["A".to_string(), "100".to_string()]],
        }];
        Arc::new(Pipeline::new(
            config,
            Arc::new(FixedWorkbookReader(sheets)),
            Some(Arc::new(FakeEmbedder { dim: 16 })),
            Arc::new(tokio::sync::Mutex::new(Box::new(FakeGenerator {
                response: "100".to_string(),
            }) as Box<dyn Generator>)),
            Arc::new(WorkerPool::new()),
        ))
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = router(test_pipeline());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn query_before_initialize_returns_conflict() {
        let app = router(test_pipeline());
        let body = serde_json::to_vec(&serde_json::json!({ "prompt": "what is revenue" })).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn initialize_with_missing_path_is_bad_request() {
        let app = router(test_pipeline());
        let body = serde_json::to_vec(&serde_json::json!({ "path": "" })).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/initialize")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn initialize_then_query_round_trips() {
        let pipeline = test_pipeline();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("book.xlsx");
        std::fs::write(&file, b"placeholder").unwrap();

        let app = router(pipeline);
        let init_body =
            serde_json::to_vec(&serde_json::json!({ "path": file.to_str().unwrap() })).unwrap();
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/initialize")
                    .header("content-type", "application/json")
                    .body(Body::from(init_body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let query_body =
            serde_json::to_vec(&serde_json::json!({ "prompt": "what is the revenue of A" })).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query")
                    .header("content-type", "application/json")
                    .body(Body::from(query_body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
