use axum::{
    Extension, Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use snapvault_core::photos::NewUpload;
use snapvault_core::storage::FileStream;
use snapvault_types::Error;
use snapvault_types::api::{Claims, PhotoFilter, PhotoResponse, UpdateTagsRequest};
use snapvault_types::models::Photo;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiResult;

fn with_url(state: &AppState, photo: Photo) -> PhotoResponse {
    let url = state.storage.resolve_url(&photo.storage_ref);
    PhotoResponse { photo, url }
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pull every file part (plus shared `tags`/`description` text parts) out of
/// a multipart body.
async fn collect_uploads(mut multipart: Multipart) -> ApiResult<Vec<NewUpload>> {
    let mut files = Vec::new();
    let mut tags: Vec<String> = Vec::new();
    let mut description: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::validation(format!("malformed multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "file" | "files" => {
                let filename = field.file_name().unwrap_or("unnamed").to_string();
                let mime_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| Error::validation(format!("failed to read {filename}: {e}")))?;
                files.push(NewUpload {
                    filename,
                    mime_type,
                    bytes,
                    tags: Vec::new(),
                    description: None,
                });
            }
            "tags" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| Error::validation(format!("malformed tags field: {e}")))?;
                tags = split_tags(&raw);
            }
            "description" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| Error::validation(format!("malformed description field: {e}")))?;
                description = Some(text);
            }
            other => {
                return Err(Error::validation(format!("unexpected field: {other}")).into());
            }
        }
    }

    for file in &mut files {
        file.tags = tags.clone();
        file.description = description.clone();
    }
    Ok(files)
}

/// POST /groups/{id}/photos — single upload, all-or-nothing.
pub async fn upload_photo(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut files = collect_uploads(multipart).await?;
    if files.len() != 1 {
        return Err(Error::validation("expected exactly one file").into());
    }
    let upload = files.remove(0);

    let photo = snapvault_core::photos::upload_photo(
        &state.db,
        &state.storage,
        group_id,
        claims.sub,
        upload,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(with_url(&state, photo))))
}

/// POST /groups/{id}/photos/batch — up to 20 files, per-file outcomes.
pub async fn batch_upload(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let files = collect_uploads(multipart).await?;
    if files.is_empty() {
        return Err(Error::validation("no files in request").into());
    }

    let result = snapvault_core::photos::batch_upload(
        &state.db,
        &state.storage,
        group_id,
        claims.sub,
        files,
    )
    .await?;
    Ok(Json(result))
}

/// GET /groups/{id}/photos — filtered, paginated listing.
pub async fn list_photos(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Query(filter): Query<PhotoFilter>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let photos =
        snapvault_core::photos::get_group_photos(&state.db, claims.sub, group_id, &filter)?;
    let photos: Vec<PhotoResponse> = photos.into_iter().map(|p| with_url(&state, p)).collect();
    Ok(Json(photos))
}

pub async fn get_photo(
    State(state): State<AppState>,
    Path(photo_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let photo = snapvault_core::photos::get_photo(&state.db, claims.sub, photo_id)?;
    Ok(Json(with_url(&state, photo)))
}

/// GET /photos/{id}/data — streams the stored bytes from whichever backend
/// holds them.
pub async fn download_photo(
    State(state): State<AppState>,
    Path(photo_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let photo = snapvault_core::photos::get_photo(&state.db, claims.sub, photo_id)?;

    let body = match state.storage.open(&photo.storage_ref).await? {
        FileStream::Local(file) => Body::from_stream(ReaderStream::new(file)),
        FileStream::Remote(resp) => Body::from_stream(resp.bytes_stream()),
    };

    Ok(([(header::CONTENT_TYPE, photo.mime_type)], body))
}

pub async fn update_tags(
    State(state): State<AppState>,
    Path(photo_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateTagsRequest>,
) -> ApiResult<impl IntoResponse> {
    let photo = snapvault_core::photos::update_tags(
        &state.db,
        claims.sub,
        photo_id,
        req.tags,
        req.description.as_deref(),
    )?;
    Ok(Json(with_url(&state, photo)))
}

pub async fn delete_photo(
    State(state): State<AppState>,
    Path(photo_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    snapvault_core::photos::delete_photo(&state.db, &state.storage, claims.sub, photo_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
