//! `/api/registrations` handlers.
//!
//! Scope is decided through `can_access`: staff read any registration, everyone
//! else goes through the user-scoped service calls where a foreign id looks
//! exactly like a missing one.

use super::{
    json_rejection, parse_id, require_email, require_non_empty, require_vehicle_year,
};
use crate::{
    api::error::{ApiError, ErrorBody},
    auth::Principal,
    registration::{
        can_access, Action, NewOwner, NewVehicle, Registration, RegistrationService,
        RegistrationStatus,
    },
};
use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SubmitRegistrationRequest {
    pub owner: NewOwner,
    pub vehicle: NewVehicle,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    /// `APPROVED` or `REJECTED`.
    pub status: String,
    /// Kept only when rejecting; blank counts as absent.
    pub rejection_reason: Option<String>,
}

#[derive(IntoParams, Deserialize, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Restrict the listing to the caller's own registrations. A bare `?mine`
    /// counts as true.
    pub mine: Option<String>,
}

impl ListQuery {
    fn mine(&self) -> bool {
        self.mine
            .as_deref()
            .is_some_and(|value| !matches!(value, "false" | "0"))
    }
}

fn validate_submission(request: &SubmitRegistrationRequest) -> Result<(), ApiError> {
    let owner = &request.owner;
    require_non_empty("owner.fullName", &owner.full_name)?;
    require_non_empty("owner.nationalId", &owner.national_id)?;
    require_non_empty("owner.phoneNumber", &owner.phone_number)?;
    require_email("owner.email", &owner.email)?;
    require_non_empty("owner.address", &owner.address)?;

    let vehicle = &request.vehicle;
    require_non_empty("vehicle.plateNumber", &vehicle.plate_number)?;
    require_non_empty("vehicle.make", &vehicle.make)?;
    require_non_empty("vehicle.model", &vehicle.model)?;
    require_vehicle_year(vehicle.year)?;
    require_non_empty("vehicle.color", &vehicle.color)?;
    require_non_empty("vehicle.chassisNumber", &vehicle.chassis_number)?;
    require_non_empty("vehicle.engineNumber", &vehicle.engine_number)?;
    require_non_empty("vehicle.vehicleType", &vehicle.vehicle_type)
}

fn parse_decision(
    request: UpdateStatusRequest,
) -> Result<(RegistrationStatus, Option<String>), ApiError> {
    let status = match request.status.parse::<RegistrationStatus>() {
        Ok(status) if status.is_terminal() => status,
        _ => {
            return Err(ApiError::validation(
                "status must be APPROVED or REJECTED",
            ))
        }
    };

    let reason = request
        .rejection_reason
        .map(|reason| reason.trim().to_string())
        .filter(|reason| !reason.is_empty());

    Ok((status, reason))
}

#[utoipa::path(
    post,
    path= "/api/registrations",
    request_body = SubmitRegistrationRequest,
    responses (
        (status = 201, description = "Registration submitted", body = Registration),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag= "registrations"
)]
#[instrument(skip_all, fields(user_id = %principal.user_id))]
pub async fn submit(
    Extension(principal): Extension<Principal>,
    registrations: Extension<Arc<RegistrationService>>,
    payload: Result<Json<SubmitRegistrationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    if !can_access(&principal, Some(principal.user_id), Action::Submit) {
        return Err(ApiError::Forbidden);
    }

    let Json(request) = payload.map_err(|rejection| json_rejection(&rejection))?;
    validate_submission(&request)?;

    let registration = registrations
        .submit(principal.user_id, request.owner, request.vehicle)
        .await?;

    Ok((StatusCode::CREATED, Json(registration)))
}

#[utoipa::path(
    get,
    path= "/api/registrations",
    params(ListQuery),
    responses (
        (status = 200, description = "Registrations, newest first", body = [Registration]),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag= "registrations"
)]
#[instrument(skip_all, fields(user_id = %principal.user_id))]
pub async fn list(
    Extension(principal): Extension<Principal>,
    registrations: Extension<Arc<RegistrationService>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = if !query.mine() && can_access(&principal, None, Action::List) {
        registrations.list_all().await?
    } else {
        debug!("Listing registrations scoped to caller");
        registrations.list_for_user(principal.user_id).await?
    };

    Ok(Json(listing))
}

#[utoipa::path(
    get,
    path= "/api/registrations/{id}",
    params(("id" = String, Path, description = "Registration id (UUID)")),
    responses (
        (status = 200, description = "Registration", body = Registration),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 404, description = "No such registration for this caller", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag= "registrations"
)]
#[instrument(skip_all, fields(user_id = %principal.user_id))]
pub async fn get(
    Extension(principal): Extension<Principal>,
    registrations: Extension<Arc<RegistrationService>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;

    let registration = if can_access(&principal, None, Action::View) {
        registrations.get_by_id(id).await?
    } else {
        registrations.get_by_id_for_user(id, principal.user_id).await?
    };

    Ok(Json(registration))
}

#[utoipa::path(
    patch,
    path= "/api/registrations/{id}/status",
    params(("id" = String, Path, description = "Registration id (UUID)")),
    request_body = UpdateStatusRequest,
    responses (
        (status = 200, description = "Decision recorded", body = Registration),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 403, description = "Caller is not a reviewer", body = ErrorBody),
        (status = 404, description = "No such registration", body = ErrorBody),
        (status = 409, description = "Registration already decided", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag= "registrations"
)]
#[instrument(skip_all, fields(user_id = %principal.user_id))]
pub async fn update_status(
    Extension(principal): Extension<Principal>,
    registrations: Extension<Arc<RegistrationService>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    if !can_access(&principal, None, Action::UpdateStatus) {
        return Err(ApiError::Forbidden);
    }

    let id = parse_id(&id)?;
    let Json(request) = payload.map_err(|rejection| json_rejection(&rejection))?;
    let (status, reason) = parse_decision(request)?;

    let registration = registrations.update_status(id, status, reason).await?;

    Ok(Json(registration))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(status: &str, reason: Option<&str>) -> UpdateStatusRequest {
        UpdateStatusRequest {
            status: status.to_string(),
            rejection_reason: reason.map(str::to_string),
        }
    }

    #[test]
    fn decisions_require_terminal_status() {
        assert!(parse_decision(decision("PENDING", None)).is_err());
        assert!(parse_decision(decision("approved", None)).is_err());
        assert!(parse_decision(decision("APPROVED", None)).is_ok());
    }

    #[test]
    fn rejection_reason_is_trimmed_and_optional() {
        assert!(matches!(
            parse_decision(decision("REJECTED", None)),
            Ok((RegistrationStatus::Rejected, None))
        ));
        assert!(matches!(
            parse_decision(decision("REJECTED", Some("  "))),
            Ok((RegistrationStatus::Rejected, None))
        ));
        assert!(matches!(
            parse_decision(decision("REJECTED", Some(" Bad VIN "))),
            Ok((RegistrationStatus::Rejected, Some(reason))) if reason == "Bad VIN"
        ));
    }

    #[test]
    fn bare_mine_flag_counts_as_true() {
        let query = |mine: Option<&str>| ListQuery {
            mine: mine.map(str::to_string),
        };
        assert!(query(Some("")).mine());
        assert!(query(Some("true")).mine());
        assert!(!query(Some("false")).mine());
        assert!(!query(None).mine());
    }
}
