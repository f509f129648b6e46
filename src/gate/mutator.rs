//! Request mutator: apply a decision to the live request / response.
//!
//! - `Allow`: `X-User-Id` is set (overwriting any client-supplied value) and the
//!   `Identity` is put into request extensions for typed extraction.
//! - `Deny`: `302 Found` with `Location`, empty body.
//! - `PassThrough`: request untouched.

use axum::{
    http::{HeaderName, Request, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::gate::decision::Outcome;

pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");

/// What the host pipeline should do next.
pub enum Applied<B> {
    Continue(Request<B>),
    Respond(Response),
}

pub fn apply<B>(outcome: Outcome, mut req: Request<B>) -> Result<Applied<B>, AppError> {
    match outcome {
        Outcome::PassThrough => Ok(Applied::Continue(req)),
        Outcome::Allow(identity) => {
            let value = identity.to_header_value().map_err(|_| {
                tracing::error!("stored identity is not representable as a header value");
                AppError::Internal
            })?;

            req.headers_mut().insert(X_USER_ID, value);
            req.extensions_mut().insert(identity);
            Ok(Applied::Continue(req))
        }
        Outcome::Deny { location, .. } => Ok(Applied::Respond(
            (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        )),
    }
}
