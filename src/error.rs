use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// Constraint failures reported by a store, independent of the backing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    UniqueViolation,
    #[error("foreign key constraint violated")]
    ForeignKeyViolation,
}

/// Tags sqlx constraint violations with a [`StoreError`] so the HTTP layer can
/// recognise them; everything else passes through untouched.
pub fn classify_db_error(err: sqlx::Error) -> anyhow::Error {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return anyhow::Error::new(err).context(StoreError::UniqueViolation);
        }
        if db.is_foreign_key_violation() {
            return anyhow::Error::new(err).context(StoreError::ForeignKeyViolation);
        }
    }
    anyhow::Error::new(err)
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("User already exists")]
    Conflict,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid refresh token")]
    InvalidToken,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Duplicate field value entered")]
    Duplicate,

    #[error("Referenced entity does not exist")]
    DanglingReference,

    #[error("{0}")]
    RateLimited(&'static str),

    #[error("Server Error")]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<StoreError>() {
            Some(StoreError::UniqueViolation) => AppError::Duplicate,
            Some(StoreError::ForeignKeyViolation) => AppError::DanglingReference,
            None => AppError::Internal(err),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::Conflict
            | AppError::Duplicate
            | AppError::DanglingReference => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::InvalidToken | AppError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(e) = &self {
            error!(error = ?e, "unhandled error");
        }
        let status = self.status_code();
        let body = ErrorBody {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_bad_request() {
        let err: AppError = anyhow::Error::new(StoreError::UniqueViolation)
            .context("insert todo")
            .into();
        assert!(matches!(err, AppError::Duplicate));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err: AppError = anyhow::Error::new(StoreError::ForeignKeyViolation).into();
        assert!(matches!(err, AppError::DanglingReference));
        assert_eq!(err.to_string(), "Referenced entity does not exist");
    }

    #[test]
    fn internal_errors_hide_details() {
        let err: AppError = anyhow::anyhow!("connection refused to 10.0.0.3").into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Server Error");
    }

    #[test]
    fn status_codes() {
        assert_eq!(AppError::Conflict.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("Todo").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::NotFound("Todo").to_string(), "Todo not found");
    }
}
