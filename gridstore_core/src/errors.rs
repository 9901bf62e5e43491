use thiserror::Error;

/// Errors surfaced by the grid engine. The HTTP layer maps these onto
/// status codes; database/serialization details stay in the logs.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("user with this email already exists")]
    EmailTaken,
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GridError>;

impl GridError {
    pub fn validation(msg: impl Into<String>) -> Self {
        GridError::Validation(msg.into())
    }
}
