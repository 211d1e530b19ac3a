use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::request::Parts,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};

use crate::db::User;
use crate::error::AppError;
use crate::services::auth::AuthService;
use crate::AppState;

/// Name of the cookie carrying the session JWT.
pub const SESSION_COOKIE: &str = "session";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

// ============================================================================
// Handlers
// ============================================================================

async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<RegisterRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), AppError> {
    let user = AuthService::register(
        &state,
        &request.email,
        &request.password,
        &request.display_name,
    )
    .await?;

    let token = AuthService::create_jwt(&state, &user.id)?;
    let jar = jar.add(session_cookie(&state, token.clone()));

    Ok((jar, Json(SessionResponse { token, user })))
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), AppError> {
    let user = AuthService::login(&state, &request.email, &request.password).await?;
    let token = AuthService::create_jwt(&state, &user.id)?;

    tracing::info!("User {} logged in", user.id);

    let jar = jar.add(session_cookie(&state, token.clone()));
    Ok((jar, Json(SessionResponse { token, user })))
}

async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

/// Sessions are stateless JWTs; logging out clears the cookie.
async fn logout(jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (
        jar,
        Json(serde_json::json!({ "message": crate::i18n::t("auth.logged_out") })),
    )
}

fn session_cookie(state: &Arc<AppState>, token: String) -> Cookie<'static> {
    let same_site = match state
        .config
        .server
        .cookie_same_site
        .as_deref()
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("strict") => SameSite::Strict,
        Some("none") => SameSite::None,
        _ => SameSite::Lax,
    };

    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(state.config.cookie_secure())
        .same_site(same_site)
        .max_age(time::Duration::hours(state.config.jwt.expiration_hours))
        .build()
}

/// Session JWT from the `Authorization: Bearer` header, or else the session cookie.
fn session_token(parts: &Parts) -> Option<String> {
    if let Some(header) = parts
        .headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if header.len() > 7 && header[..7].eq_ignore_ascii_case("bearer ") {
            let token = header[7..].trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
        tracing::debug!("Authorization header is not a usable bearer token");
    }

    CookieJar::from_headers(&parts.headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// Extractors
// ============================================================================

/// Extractor for an authenticated user. Rejects with 401.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(parts).ok_or_else(|| {
            tracing::debug!("Missing session token");
            AppError::Unauthorized
        })?;

        let user = AuthService::get_user_from_token(state, &token)
            .await
            .map_err(|e| {
                tracing::debug!("Failed to get user from token: {:?}", e);
                e
            })?;

        tracing::debug!("Authenticated user: {}", user.id);
        Ok(AuthUser(user))
    }
}

/// Session user when one is present and valid. Never rejects; token
/// endpoints fall back to the shared link when this is `None`.
pub struct MaybeAuthUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(parts) else {
            return Ok(MaybeAuthUser(None));
        };

        match AuthService::get_user_from_token(state, &token).await {
            Ok(user) => Ok(MaybeAuthUser(Some(user))),
            Err(e) => {
                tracing::debug!("Ignoring invalid session: {:?}", e);
                Ok(MaybeAuthUser(None))
            }
        }
    }
}
