/*
 * Responsibility
 * - Config読み込み → 依存生成 (token store, AuthService) → Router 組み立て
 * - Middleware の適用 (http 共通 / 認証)
 * - axum::serve() で起動
 */
use std::sync::Arc;
use std::time::Duration;
use std::{panic, process};

use anyhow::Result;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, ConfigError};
use crate::repos::{PgTokenStore, TokenStore};
use crate::services::auth::build_auth_service;
use crate::state::AppState;
use crate::{api, middleware};

const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,backend_auth=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // development では即落とす, production は default hook (stderr) に任せる
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

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting auth service in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config)?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build process-level services and inject them into the shared state.
pub fn build_state(config: &Config) -> Result<AppState> {
    let store: Option<Arc<dyn TokenStore>> = if config.signed_token_auth {
        let url = config
            .database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        // Connections are opened on first lookup
        let pool = PgPoolOptions::new().max_connections(5).connect_lazy(url)?;
        Some(Arc::new(PgTokenStore::new(pool)))
    } else {
        None
    };

    let auth = build_auth_service(config, store)?;
    Ok(AppState::new(auth))
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = middleware::auth::apply(api::routes(), state.clone()).with_state(state);
    middleware::http::apply(router, request_timeout(config))
}

/// A request may wait on two upstream identity providers in turn.
fn request_timeout(config: &Config) -> Duration {
    let upstream = Duration::from_secs(config.upstream_timeout_seconds);
    MIN_REQUEST_TIMEOUT.max(upstream * 2 + Duration::from_secs(5))
}
