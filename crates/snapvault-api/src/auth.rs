use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use snapvault_types::Error;
use snapvault_types::api::{
    Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::middleware::BearerToken;
use crate::AppState;

const MIN_PASSWORD_LEN: usize = 8;
const TOKEN_VALIDITY_DAYS: i64 = 30;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(Error::validation("password must be at least 8 characters").into());
    }

    // Hash with Argon2id before the core ever sees the password
    let password_hash = hash_password(&req.password)?;

    let user = snapvault_core::users::register_user(&state.db, &req.name, &req.email, &password_hash)?;

    let token = create_token(&state.jwt_secret, user.id, &user.name)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();
    let user = state
        .db
        .get_user_by_email(&email)?
        .ok_or(ApiError::Unauthenticated)?;

    verify_password(&req.password, &user.password)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id: {}", e))?;
    let token = create_token(&state.jwt_secret, user_id, &user.name)?;

    Ok(Json(LoginResponse {
        user_id,
        name: user.name,
        token,
    }))
}

/// Revoke the presented token; it stays invalid until it would have
/// expired anyway.
pub async fn logout(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> ApiResult<impl IntoResponse> {
    state.db.revoke_token(&token.0)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub(crate) fn verify_password(password: &str, stored_hash: &str) -> Result<(), ApiError> {
    let parsed_hash = PasswordHash::new(stored_hash).map_err(|e| {
        ApiError::Core(Error::Internal(anyhow::anyhow!(
            "corrupt password hash: {}",
            e
        )))
    })?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthenticated)
}

fn create_token(secret: &str, user_id: Uuid, name: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_VALIDITY_DAYS)).timestamp()
            as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
