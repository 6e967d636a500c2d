use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::merge_core::domain::MergeRequest;
use crate::merge_core::engine::MergeEngine;

const MISSING_FIELDS: &str = "Missing required fields: bucket, chunkPrefix, outputKey";

/// The full HTTP surface: submit / list / fetch-by-id under `/api/merge`
/// plus the health probe. Deliberately a thin translator: input
/// validation and status mapping only.
pub fn router(engine: MergeEngine) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/merge", post(submit_merge).get(list_jobs))
        .route("/api/merge/{job_id}", get(get_job))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

/// Submit body with every field optional so validation can produce the
/// documented 400 instead of a deserialization rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SubmitBody {
    bucket: Option<String>,
    chunk_prefix: Option<String>,
    output_key: Option<String>,
}

async fn submit_merge(
    State(engine): State<MergeEngine>,
    Json(body): Json<SubmitBody>,
) -> Response {
    let (Some(bucket), Some(chunk_prefix), Some(output_key)) = (
        required(body.bucket),
        required(body.chunk_prefix),
        required(body.output_key),
    ) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": MISSING_FIELDS })),
        )
            .into_response();
    };

    let job = engine.submit_merge_job(MergeRequest {
        bucket,
        chunk_prefix,
        output_key,
    });
    (
        StatusCode::ACCEPTED,
        Json(json!({
            "jobId": job.id,
            "message": "Merge job started",
            "statusUrl": format!("/api/merge/{}", job.id),
        })),
    )
        .into_response()
}

async fn list_jobs(State(engine): State<MergeEngine>) -> Response {
    Json(json!({ "jobs": engine.jobs() })).into_response()
}

async fn get_job(State(engine): State<MergeEngine>, Path(job_id): Path<String>) -> Response {
    match engine.job(&job_id) {
        Some(job) => Json(json!({ "job": job })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Job not found" })),
        )
            .into_response(),
    }
}

async fn health() -> Response {
    Json(json!({ "status": "ok", "service": "video-merger" })).into_response()
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.trim().is_empty())
}
