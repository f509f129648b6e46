//! Access-control phase: run the auth token gate before the routes it wraps.
//!
//! Per request:
//! - skip requests marked `InternalRequest`
//! - select the scope snapshot for the original request path
//! - `decision::decide` (locate token -> resolve identity)
//! - `mutator::apply`: continue with `X-User-Id`, or answer with the redirect

use axum::{
    Router,
    body::Body,
    extract::{OriginalUri, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::gate::InternalRequest;
use crate::gate::decision;
use crate::gate::mutator::{self, Applied};
use crate::state::AppState;

/// Put the gate in front of every route (and the fallback) of `router`.
///
/// 例：
/// ```ignore
/// let gated = api::v1::routes();
/// let gated = middleware::auth::access::apply(gated, state.clone());
/// app = app.merge(gated);
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    OriginalUri(original_uri): OriginalUri,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if req.extensions().get::<InternalRequest>().is_some() {
        return Ok(next.run(req).await);
    }

    // Hold one snapshot for the whole request; a concurrent reload swaps the table, not this Arc.
    let scopes = state.gate.scopes();
    let config = scopes.select(original_uri.path());

    let outcome = decision::decide(req.headers(), config, state.gate.store()).await;

    match mutator::apply(outcome, req)? {
        Applied::Continue(req) => Ok(next.run(req).await),
        Applied::Respond(res) => Ok(res),
    }
}
