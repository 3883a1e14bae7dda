//! Bearer-token authentication for `/api/*`.
//!
//! Flow: read `Authorization: Bearer <token>`, verify it with the token service,
//! and insert the resulting [`Principal`] into the request extensions where the
//! handlers pick it up with `Extension<Principal>`.

use crate::{
    api::error::ApiError,
    auth::{AuthService, Principal},
};
use axum::{
    extract::{Extension, Request},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, Span};

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Resolve the bearer token into a principal, or stop the request with 401.
pub async fn require_principal(
    Extension(auth): Extension<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = extract_bearer_token(request.headers()) else {
        debug!("Request without bearer token");
        return Err(ApiError::MissingToken);
    };

    let principal: Principal = auth.authenticate(token)?;
    Span::current().record("user_id", tracing::field::display(principal.user_id));

    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}
