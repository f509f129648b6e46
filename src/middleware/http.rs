//! HTTP-level middleware (cross-cutting concerns).
//!
//! Responsibility:
//! - Request-Id generation + propagation (X-Request-Id), so gate denials in the
//!   logs can be correlated with access log lines
//! - Access logging / request tracing (TraceLayer)
//! - Body size limits
//! - Global timeout (also bounds the identity store call from the outside)
//! - Security response headers (`security_headers`), applied inside the timeout

use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::http::{StatusCode, header::HeaderName};
use tower::timeout::TimeoutLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::security_headers;

const REQUEST_ID_HEADER: &str = "x-request-id";
const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Apply HTTP-level middleware to the given Router.
///
/// A request exceeding `timeout` is answered with 408; dropping the inner
/// future cancels any identity store lookup still in flight.
pub fn apply(router: Router, timeout: Duration) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    let layers = ServiceBuilder::new()
        // Make the service error `Infallible` by converting errors into responses.
        .layer(HandleErrorLayer::new(|err: BoxError| async move {
            if err.is::<tower::timeout::error::Elapsed>() {
                StatusCode::REQUEST_TIMEOUT
            } else {
                tracing::error!(error = %err, "unhandled middleware error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }))
        .layer(SetRequestIdLayer::new(
            request_id_header.clone(),
            MakeRequestUuid,
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http());

    security_headers::apply(router).layer(layers)
}
