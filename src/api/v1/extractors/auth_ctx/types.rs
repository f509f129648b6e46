/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - access gate が store で解決した Identity をそのまま持つ (形式の解釈はしない)
 */
use crate::gate::Identity;

/// 認証済みのリクエストに付与されるコンテキスト
#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub user_id: Identity,
}

impl AuthCtx {
    pub fn new(user_id: Identity) -> Self {
        Self { user_id }
    }
}
