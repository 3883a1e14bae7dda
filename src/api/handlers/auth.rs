use super::{json_rejection, require_email, require_non_empty, MIN_PASSWORD_LEN};
use crate::{
    api::error::{ApiError, ErrorBody},
    auth::{AuthService, AuthSession, SignUp},
};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::instrument;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

fn validate_sign_up(request: &SignUp) -> Result<(), ApiError> {
    require_email("email", &request.email)?;
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    require_non_empty("fullName", &request.full_name)?;
    require_non_empty("phoneNumber", &request.phone_number)
}

#[utoipa::path(
    post,
    path= "/auth/register",
    request_body = SignUp,
    responses (
        (status = 201, description = "Account created", body = AuthSession),
        (status = 400, description = "Invalid input or email already registered", body = ErrorBody),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    auth: Extension<Arc<AuthService>>,
    payload: Result<Json<SignUp>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|rejection| json_rejection(&rejection))?;
    validate_sign_up(&request)?;

    let session = auth.register(request).await?;

    Ok((StatusCode::CREATED, Json(session)))
}

#[utoipa::path(
    post,
    path= "/auth/login",
    request_body = LoginRequest,
    responses (
        (status = 200, description = "Signed in", body = AuthSession),
        (status = 400, description = "Malformed input", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    auth: Extension<Arc<AuthService>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|rejection| json_rejection(&rejection))?;
    require_non_empty("email", &request.email)?;
    require_non_empty("password", &request.password)?;

    let session = auth.login(&request.email, &request.password).await?;

    Ok(Json(session))
}
