use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::{CreateUser, User, UserRepository};
use crate::error::{AppError, AppResult};
use crate::AppState;

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

pub struct AuthService;

impl AuthService {
    /// Register a new account with an email + password.
    pub async fn register(
        state: &Arc<AppState>,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> AppResult<User> {
        let email = Self::normalize_email(email)?;
        let display_name = display_name.trim();

        if display_name.is_empty() {
            return Err(AppError::Validation(crate::i18n::t("validation.name_empty")));
        }

        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::Validation(crate::i18n::t_with(
                "validation.password_short",
                &[("min", &MIN_PASSWORD_LENGTH.to_string())],
            )));
        }

        if UserRepository::find_by_email(&state.db, &email)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(crate::i18n::t("conflict.email_taken")));
        }

        let password_hash = bcrypt::hash(password, state.config.jwt.bcrypt_cost)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))?;

        let user = UserRepository::create(
            &state.db,
            CreateUser {
                email,
                display_name: display_name.to_string(),
                password_hash,
            },
        )
        .await?;

        tracing::info!("Registered user {}", user.id);
        Ok(user)
    }

    /// Verify credentials and return the matching user.
    pub async fn login(state: &Arc<AppState>, email: &str, password: &str) -> AppResult<User> {
        let email = email.trim().to_lowercase();
        let user = match UserRepository::find_by_email(&state.db, &email).await? {
            Some(user) => user,
            None => {
                tracing::debug!("Login attempt for unknown email");
                return Err(AppError::Unauthorized);
            }
        };

        let valid = bcrypt::verify(password, &user.password_hash)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to verify password: {}", e)))?;

        if !valid {
            tracing::debug!("Invalid password for user {}", user.id);
            return Err(AppError::Unauthorized);
        }

        Ok(user)
    }

    /// Create a signed JWT for a user id
    pub fn create_jwt(state: &Arc<AppState>, user_id: &str) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::hours(state.config.jwt.expiration_hours);
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(state.config.jwt.secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// Decode and validate a JWT, returning the claims
    pub fn decode_jwt(state: &Arc<AppState>, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.config.jwt.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Get user from JWT token
    pub async fn get_user_from_token(state: &Arc<AppState>, token: &str) -> AppResult<User> {
        let claims = Self::decode_jwt(state, token)?;
        let user = UserRepository::find_by_id(&state.db, &claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;
        Ok(user)
    }

    /// Generate random string
    pub fn generate_random_string(length: usize) -> String {
        use rand::Rng;
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = rand::thread_rng();
        (0..length)
            .map(|_| {
                let idx = rng.gen_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }

    fn normalize_email(email: &str) -> AppResult<String> {
        let email = email.trim().to_lowercase();
        let valid = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
            }
            None => false,
        };

        if !valid || email.chars().any(char::is_whitespace) {
            return Err(AppError::Validation(crate::i18n::t("validation.email")));
        }

        Ok(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_string_has_requested_length_and_charset() {
        let s = AuthService::generate_random_string(32);
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(s, AuthService::generate_random_string(32));
    }

    #[test]
    fn normalize_email_lowercases_and_validates() {
        assert_eq!(
            AuthService::normalize_email("  Ana@Studio.COM ").unwrap(),
            "ana@studio.com"
        );
        assert!(AuthService::normalize_email("no-at-sign").is_err());
        assert!(AuthService::normalize_email("@studio.com").is_err());
        assert!(AuthService::normalize_email("ana@localhost").is_err());
        assert!(AuthService::normalize_email("a na@studio.com").is_err());
    }
}
