use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use snapvault_types::api::{
    Claims, UpdateBioRequest, UpdateEmailRequest, UpdateNameRequest, UpdatePasswordRequest,
};
use snapvault_types::Error;

use crate::auth::{hash_password, verify_password};
use crate::error::ApiResult;
use crate::AppState;

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let user = snapvault_core::users::get_profile(&state.db, claims.sub)?;
    Ok(Json(user))
}

pub async fn update_bio(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateBioRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = snapvault_core::users::update_bio(&state.db, claims.sub, &req.bio)?;
    Ok(Json(user))
}

pub async fn update_name(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateNameRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = snapvault_core::users::update_name(&state.db, claims.sub, &req.name)?;
    Ok(Json(user))
}

/// Email changes re-verify the current password: a stolen session alone
/// must not be able to take over the account's login identity.
pub async fn update_email(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateEmailRequest>,
) -> ApiResult<impl IntoResponse> {
    let row = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or(Error::NotFound("user"))?;
    verify_password(&req.password, &row.password)?;

    let user = snapvault_core::users::update_email(&state.db, claims.sub, &req.email)?;
    Ok(Json(user))
}

pub async fn update_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdatePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.new_password.len() < 8 {
        return Err(Error::validation("password must be at least 8 characters").into());
    }

    let row = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or(Error::NotFound("user"))?;
    verify_password(&req.current_password, &row.password)?;

    let new_hash = hash_password(&req.new_password)?;
    snapvault_core::users::update_password(&state.db, claims.sub, &new_hash)?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /users/me/profile-picture — raw image bytes; the declared type comes
/// from the Content-Type header.
pub async fn update_profile_picture(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    bytes: Bytes,
) -> ApiResult<impl IntoResponse> {
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let user = snapvault_core::users::set_profile_picture(
        &state.db,
        &state.storage,
        claims.sub,
        &mime_type,
        bytes,
    )
    .await?;
    Ok(Json(user))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    snapvault_core::users::delete_account(&state.db, &state.storage, claims.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}
