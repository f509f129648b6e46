/*
 * Responsibility
 * - v1 の URL 構造を定義 (/api/v1/...)
 * - ここで定義したルートは app.rs で access gate の内側に置かれる
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::whoami::whoami;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/v1/whoami", get(whoami))
}
