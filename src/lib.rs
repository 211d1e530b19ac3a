//! Design-review backend: artworks, shared review links, feedback,
//! approvals and reminders.

use std::sync::Arc;

use axum::Router;

pub mod config;
pub mod db;
pub mod error;
pub mod i18n;
pub mod middleware;
pub mod recorder;
pub mod routes;
pub mod services;

use config::Config;
use services::{speech::SpeechService, storage::StorageSigner};

/// Shared state handed to every handler. Built once at startup.
pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub speech: SpeechService,
    pub storage: Option<StorageSigner>,
}

/// Router with state and security headers applied, without rate limits.
pub fn app(state: Arc<AppState>) -> Router {
    routes::router()
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::csp::csp_middleware))
}
