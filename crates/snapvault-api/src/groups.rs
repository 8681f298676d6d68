use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use snapvault_types::api::{
    Claims, CreateGroupRequest, JoinGroupRequest, JoinGroupResponse, SetMemberRoleRequest,
    TransferOwnershipRequest, UpdateGroupRequest,
};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiResult;

pub async fn create_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateGroupRequest>,
) -> ApiResult<impl IntoResponse> {
    let group = snapvault_core::groups::create_group(
        &state.db,
        claims.sub,
        &req.name,
        req.description.as_deref(),
    )?;
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn join_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<JoinGroupRequest>,
) -> ApiResult<impl IntoResponse> {
    let (group, role) = snapvault_core::groups::join_group(&state.db, claims.sub, &req.invite_code)?;
    Ok(Json(JoinGroupResponse {
        group_id: group.id,
        group_name: group.name,
        role,
    }))
}

pub async fn my_groups(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let groups = snapvault_core::groups::list_my_groups(&state.db, claims.sub)?;
    Ok(Json(groups))
}

pub async fn get_group(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let group = snapvault_core::groups::get_group(&state.db, claims.sub, group_id)?;
    Ok(Json(group))
}

pub async fn list_members(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let members = snapvault_core::groups::list_members(&state.db, claims.sub, group_id)?;
    Ok(Json(members))
}

pub async fn update_group(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateGroupRequest>,
) -> ApiResult<impl IntoResponse> {
    let group = snapvault_core::groups::update_group(
        &state.db,
        claims.sub,
        group_id,
        req.name.as_deref(),
        req.description.as_deref(),
    )?;
    Ok(Json(group))
}

pub async fn delete_group(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    snapvault_core::groups::delete_group(&state.db, &state.storage, claims.sub, group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn leave_group(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    snapvault_core::groups::leave_group(&state.db, claims.sub, group_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_member_role(
    State(state): State<AppState>,
    Path((group_id, user_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetMemberRoleRequest>,
) -> ApiResult<impl IntoResponse> {
    snapvault_core::groups::set_member_role(&state.db, claims.sub, group_id, user_id, req.role)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn transfer_ownership(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TransferOwnershipRequest>,
) -> ApiResult<impl IntoResponse> {
    snapvault_core::groups::transfer_ownership(&state.db, claims.sub, group_id, req.new_owner_id)?;
    Ok(StatusCode::NO_CONTENT)
}
