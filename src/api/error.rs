//! Mapping of core errors onto HTTP responses.
//!
//! Every failure leaves as `{"code", "message"}`. Infrastructure errors are
//! logged here and replaced by a generic message so no query text or internal
//! state reaches the caller.

use crate::error::Error;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// Malformed input rejected before reaching the services.
    Validation(String),
    MissingToken,
    Forbidden,
    Core(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Core(err)
    }
}

impl ApiError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::MissingToken => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Core(err) => match err {
                Error::DuplicateEmail => StatusCode::BAD_REQUEST,
                Error::InvalidCredentials | Error::InvalidToken | Error::ExpiredToken => {
                    StatusCode::UNAUTHORIZED
                }
                Error::NotFound => StatusCode::NOT_FOUND,
                Error::InvalidTransition { .. } => StatusCode::CONFLICT,
                Error::InvalidReference => StatusCode::UNPROCESSABLE_ENTITY,
                Error::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn body(&self) -> ErrorBody {
        let (code, message) = match self {
            Self::Validation(message) => ("VALIDATION_ERROR", message.clone()),
            Self::MissingToken => (
                "MISSING_TOKEN",
                "missing or malformed bearer token".to_string(),
            ),
            Self::Forbidden => ("FORBIDDEN", "insufficient permissions".to_string()),
            Self::Core(err @ Error::Infrastructure(_)) => {
                (err.code(), "internal server error".to_string())
            }
            Self::Core(err) => (err.code(), err.to_string()),
        };
        ErrorBody {
            code: code.to_string(),
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Core(Error::Infrastructure(err)) = &self {
            error!("Request failed: {err:#}");
        }
        (self.status(), Json(self.body())).into_response()
    }
}
