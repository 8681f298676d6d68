use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use snapvault_types::Error;
use tracing::error;

/// HTTP rendering for failures. Core errors map to statuses by kind alone —
/// handlers never pick codes themselves. `Unauthenticated` is the API
/// layer's own: credential checking is not part of the core taxonomy.
pub enum ApiError {
    Core(Error),
    Unauthenticated,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Core(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Core(Error::Internal(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "invalid credentials".to_string(),
            ),
            ApiError::Core(e) => {
                let status = match e {
                    Error::Validation(_) | Error::TooManyFiles { .. } => StatusCode::BAD_REQUEST,
                    Error::NotFound(_) => StatusCode::NOT_FOUND,
                    Error::Forbidden(_) => StatusCode::FORBIDDEN,
                    Error::AlreadyMember => StatusCode::CONFLICT,
                    Error::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    Error::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    Error::ContentMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    Error::StorageWrite(_) | Error::Internal(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.kind(), e.to_string())
            }
        };

        if status.is_server_error() {
            if let ApiError::Core(e) = &self {
                error!("Request failed: {:?}", e);
            }
        }

        let body = Json(json!({
            "error": kind,
            "message": message,
        }));
        (status, body).into_response()
    }
}
