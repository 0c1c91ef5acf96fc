//! HTTP surface for the IT Genie assistant.
//!
//! - `POST /ask` – Answer a question from the ingested documents. Accepts `{ "query": "..." }`
//!   and returns `{ "query": "...", "answer": "..." }`.
//! - `GET /health` – Report whether Qdrant is reachable and the collection is present.
//!
//! CORS is permissive so browser front-ends on any origin can call the API.

use crate::qdrant::payload::current_timestamp_rfc3339;
use crate::rag::{HealthSnapshot, QueryApi, RagError};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Build the HTTP router exposing the question-answering API.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: QueryApi + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(ask_question::<S>))
        .route("/health", get(health::<S>))
        .layer(cors)
        .with_state(service)
}

/// Request body for the `POST /ask` endpoint.
#[derive(Deserialize)]
struct QueryRequest {
    query: String,
}

/// Success response for the `POST /ask` endpoint.
#[derive(Serialize)]
struct QueryResponse {
    query: String,
    answer: String,
}

async fn ask_question<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError>
where
    S: QueryApi,
{
    let answer = service.answer(&request.query).await?;
    Ok(Json(QueryResponse {
        query: request.query,
        answer,
    }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    qdrant: HealthSnapshot,
}

async fn health<S>(State(service): State<Arc<S>>) -> (StatusCode, Json<HealthResponse>)
where
    S: QueryApi,
{
    let snapshot = service.health().await;
    let (status_code, status) = if snapshot.reachable {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            timestamp: current_timestamp_rfc3339(),
            qdrant: snapshot,
        }),
    )
}

struct AppError(RagError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "Query failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

impl From<RagError> for AppError {
    fn from(inner: RagError) -> Self {
        Self(inner)
    }
}
