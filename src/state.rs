/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - gate: scope table (reload 可能) + identity store
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::gate::Gate;

#[derive(Clone, Debug)]
pub struct AppState {
    pub gate: Arc<Gate>,
}

impl AppState {
    pub fn new(gate: Arc<Gate>) -> Self {
        Self { gate }
    }
}
