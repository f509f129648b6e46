/*
 * Responsibility
 * - Config 読み込み → 依存生成 (identity store, scope table) → Router 組み立て
 * - Middleware の適用 (auth token gate / HTTP 横断)
 * - axum::serve() で起動、SIGHUP で scope table を reload
 */
use std::{panic, process, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::v1::{self, handlers::fallback::fallback, handlers::health::health};
use crate::config::{Config, ScopeSource, StoreKind};
use crate::gate::resolver::CacheIdentityStore;
use crate::gate::scope::ScopeError;
use crate::gate::{Gate, IdentityStore, MemoryIdentityStore};
use crate::middleware;
use crate::services::cache::ValkeyClient;
use crate::state::AppState;

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,auth_token_gate=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    // Keep the default hook as a fallback (prints to stderr with location/payload).
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    let abort_on_panic = !config.app_env.is_production();
    init_panic_hook(abort_on_panic);

    tracing::info!(
        "starting auth token gate in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config)?;

    #[cfg(unix)]
    spawn_reload_on_hangup(state.clone(), config.scopes.clone())?;

    let app = build_router(state, config.request_timeout);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shut down");
    Ok(())
}

fn build_state(config: &Config) -> Result<AppState> {
    let scopes = config
        .scopes
        .load()
        .context("failed to load auth token scopes")?;
    tracing::info!(scopes = scopes.len(), source = ?config.scopes, "auth token scopes loaded");

    let store: Arc<dyn IdentityStore> = match config.store_kind {
        StoreKind::Valkey => {
            let url = config.store.redis_url();
            let client = ValkeyClient::new(&url)?;
            tracing::info!(
                host = %config.store.host,
                port = config.store.port,
                timeout_ms = config.store_timeout.as_millis() as u64,
                "identity store: valkey"
            );
            Arc::new(CacheIdentityStore::new(
                Arc::new(client),
                config.store_timeout,
            ))
        }
        StoreKind::Memory => {
            tracing::warn!("identity store: in-memory (every token is unknown)");
            Arc::new(MemoryIdentityStore::new())
        }
    };

    Ok(AppState::new(Arc::new(Gate::new(scopes, store))))
}

/// `/health` stays outside the gate; every other path, including unknown ones, is gated.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let gated = v1::routes().fallback(fallback);
    let gated = middleware::auth::access::apply(gated, state.clone());

    let router = Router::new()
        .route("/health", get(health))
        .merge(gated)
        .with_state(state);

    middleware::http::apply(router, request_timeout)
}

/// Re-read `source` on the blocking pool and swap the new table in whole.
///
/// On error the current table stays in place.
pub async fn reload_scopes(state: &AppState, source: &ScopeSource) -> Result<usize, ScopeError> {
    let source = source.clone();
    let scopes = tokio::task::spawn_blocking(move || source.load()).await??;

    let count = scopes.len();
    state.gate.replace_scopes(scopes);
    Ok(count)
}

#[cfg(unix)]
fn spawn_reload_on_hangup(state: AppState, source: ScopeSource) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    if let ScopeSource::Env = source {
        tracing::info!("auth token scopes come from the environment; SIGHUP reload disabled");
        return Ok(());
    }

    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            match reload_scopes(&state, &source).await {
                Ok(count) => tracing::info!(scopes = count, "auth token scopes reloaded"),
                Err(err) => tracing::error!(
                    error = %err,
                    "scope reload failed; keeping previous configuration"
                ),
            }
        }
    });

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
