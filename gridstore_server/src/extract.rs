use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use gridstore_core::auth::{verify_token, Claims};
use gridstore_core::errors::GridError;

use crate::error::ApiError;
use crate::AppState;

/// Extractor for `Authorization: Bearer <token>`. Rejects missing, malformed,
/// forged and expired tokens with 401 before the handler runs.
pub struct AuthUser(pub Claims);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError(GridError::InvalidToken))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(ApiError(GridError::InvalidToken))?;

        let claims = verify_token(token, &state.token_secret)?;

        Ok(AuthUser(claims))
    }
}
