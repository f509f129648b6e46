//! Decision engine: locate -> resolve -> outcome.
//!
//! `decide` is side-effect free apart from logging and the store lookup; it
//! only reads the request headers. Applying the outcome is `mutator::apply`.
//!
//! State machine (linear, every step terminal on failure):
//! 1. scope disabled            -> `PassThrough`
//! 2. no token located          -> `Deny(CredentialMissing)`
//! 3. store: no such key        -> `Deny(IdentityNotFound)`
//!    store: unreachable / slow -> `Deny(StoreUnavailable)`
//! 4. store: hit                -> `Allow(identity)`

use axum::http::{HeaderMap, HeaderValue};

use crate::gate::locator;
use crate::gate::resolver::{IdentityStore, Resolution};
use crate::gate::scope::GateConfig;
use crate::gate::token::Identity;

#[derive(Debug)]
pub enum Outcome {
    /// Gate disabled for the scope; the request proceeds untouched.
    PassThrough,
    Allow(Identity),
    Deny {
        location: HeaderValue,
        reason: DenyReason,
    },
}

/// Why a request was denied. Only ever logged; the client always sees the same redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    CredentialMissing,
    IdentityNotFound,
    StoreUnavailable,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::CredentialMissing => "credential_missing",
            DenyReason::IdentityNotFound => "identity_not_found",
            DenyReason::StoreUnavailable => "store_unavailable",
        }
    }
}

pub async fn decide(
    headers: &HeaderMap,
    config: &GateConfig,
    store: &dyn IdentityStore,
) -> Outcome {
    if !config.enabled {
        return Outcome::PassThrough;
    }

    let Some(token) = locator::locate(headers, config) else {
        return deny(config, DenyReason::CredentialMissing);
    };

    let fingerprint = token.fingerprint();
    tracing::debug!(
        token = %fingerprint,
        backend = store.backend_name(),
        "looking up user by auth token"
    );

    match store.lookup(&token).await {
        Resolution::Found(identity) => Outcome::Allow(identity),
        Resolution::NotFound => {
            tracing::info!(token = %fingerprint, "auth token not found in store");
            deny(config, DenyReason::IdentityNotFound)
        }
        Resolution::Unavailable(failure) => {
            tracing::error!(
                token = %fingerprint,
                backend = store.backend_name(),
                error = %failure,
                "identity store unavailable"
            );
            deny(config, DenyReason::StoreUnavailable)
        }
    }
}

fn deny(config: &GateConfig, reason: DenyReason) -> Outcome {
    tracing::warn!(
        reason = reason.as_str(),
        location = ?config.redirect_location,
        "access denied, redirecting"
    );

    Outcome::Deny {
        location: config.redirect_location.clone(),
        reason,
    }
}
