use std::sync::Arc;

use axum::{routing::get, Router};

use crate::AppState;

pub mod approvals;
pub mod artworks;
pub mod auth;
pub mod feedbacks;
pub mod health;
pub mod links;
pub mod projects;
pub mod shared_links;
pub mod speech;

#[cfg(test)]
mod tests;

/// Assemble the API. `auth` is mounted at `/api/auth`; `public` carries the
/// token endpoints and is merged at the root. Callers wrap those two in rate
/// limiters before passing them in.
pub fn compose(
    auth: Router<Arc<AppState>>,
    public: Router<Arc<AppState>>,
) -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/auth", auth)
        .merge(public)
        .nest("/api/projetos", projects::router())
        .nest("/api/arte", artworks::router())
        .nest("/api/feedbacks", feedbacks::router())
        .nest("/api/aprovacoes", approvals::router())
        .nest("/api/links", shared_links::router())
        .nest("/api/speech", speech::router())
}

/// The API without rate limiting.
pub fn router() -> Router<Arc<AppState>> {
    compose(auth::router(), links::router())
}
