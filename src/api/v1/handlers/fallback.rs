/*
 * Responsibility
 * - 未定義パスの 404
 * - fallback も access gate の内側なので、未認証なら 404 より先に redirect される
 */
use crate::error::AppError;

pub async fn fallback() -> AppError {
    AppError::not_found("resource")
}
