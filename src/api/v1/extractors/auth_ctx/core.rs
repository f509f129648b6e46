use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::gate::Identity;
use crate::state::AppState;

use super::AuthCtx;

/// Handler で AuthCtx を受け取るための extractor
/// access gate が Identity を request.extensions() に insert 済みである前提
/// 見つからない場合は 401 を返す（gate が無効な scope・ミドルウェア未設定）
pub struct AuthCtxExtractor(pub AuthCtx);

impl FromRequestParts<AppState> for AuthCtxExtractor
where
    AppState: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(|identity| AuthCtxExtractor(AuthCtx::new(identity)))
            .ok_or(AppError::Unauthorized)
    }
}
