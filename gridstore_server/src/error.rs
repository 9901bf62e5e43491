use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use serde_json::json;

use gridstore_core::errors::GridError;

/// Response-side wrapper: maps engine errors onto HTTP statuses. Client
/// mistakes get their message back; everything else is logged and answered
/// with a generic 500.
pub struct ApiError(pub GridError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<GridError> for ApiError {
    fn from(err: GridError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            GridError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            GridError::InvalidCredentials | GridError::InvalidToken | GridError::TokenExpired => {
                (StatusCode::UNAUTHORIZED, self.0.to_string())
            }
            GridError::NotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            GridError::EmailTaken => (StatusCode::CONFLICT, self.0.to_string()),
            other => {
                error!("request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

pub fn bad_multipart(err: MultipartError) -> ApiError {
    ApiError(GridError::validation(format!(
        "invalid multipart request: {}",
        err
    )))
}
