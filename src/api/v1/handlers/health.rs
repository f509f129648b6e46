/*
 * Responsibility
 * - GET /health (疎通用)
 * - access gate の外側に置く (store が落ちていても 200)
 */
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}
