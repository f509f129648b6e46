/*
 * Responsibility
 * - GET /api/v1/whoami
 * - access gate が注入した identity をそのまま返す (downstream handler の例)
 */
use axum::Json;
use serde::Serialize;

use crate::api::v1::extractors::AuthCtxExtractor;

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub user_id: String,
}

pub async fn whoami(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse {
        user_id: ctx.user_id.to_string(),
    })
}
