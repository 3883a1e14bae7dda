//! Route handlers and the input checks they share.
//!
//! Handlers only parse and shape-check requests, pick the scope allowed by
//! [`crate::registration::can_access`], and hand typed values to the services.

pub mod auth;
pub mod health;
pub mod principal;
pub mod registrations;
pub mod root;

use super::error::ApiError;
use axum::extract::rejection::JsonRejection;
use chrono::{Datelike, Utc};
use regex::Regex;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;

/// First year a motor vehicle could have been built.
pub const MIN_VEHICLE_YEAR: i32 = 1886;

/// Lightweight email sanity check; real verification is out of band.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

pub(crate) fn require_email(field: &str, value: &str) -> Result<(), ApiError> {
    if valid_email(value) {
        Ok(())
    } else {
        Err(ApiError::validation(format!("{field} must be a valid email address")))
    }
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}

pub(crate) fn require_vehicle_year(year: i32) -> Result<(), ApiError> {
    let max = Utc::now().year() + 1;
    if (MIN_VEHICLE_YEAR..=max).contains(&year) {
        Ok(())
    } else {
        Err(ApiError::validation(format!(
            "vehicle.year must be between {MIN_VEHICLE_YEAR} and {max}"
        )))
    }
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::validation("id must be a UUID"))
}

pub(crate) fn json_rejection(rejection: &JsonRejection) -> ApiError {
    ApiError::validation(format!("invalid request body: {}", rejection.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(valid_email("ada@example.com"));
        assert!(!valid_email("ada@example"));
        assert!(!valid_email("ada example.com"));
        assert!(!valid_email(""));
    }

    #[test]
    fn non_empty_rejects_whitespace() {
        assert!(require_non_empty("fullName", "Ada").is_ok());
        assert!(require_non_empty("fullName", "   ").is_err());
    }

    #[test]
    fn vehicle_year_bounds() {
        let next_year = Utc::now().year() + 1;
        assert!(require_vehicle_year(MIN_VEHICLE_YEAR).is_ok());
        assert!(require_vehicle_year(next_year).is_ok());
        assert!(require_vehicle_year(MIN_VEHICLE_YEAR - 1).is_err());
        assert!(require_vehicle_year(next_year + 1).is_err());
    }

    #[test]
    fn ids_must_be_uuids() {
        assert!(parse_id("not-a-uuid").is_err());
        assert!(parse_id(&Uuid::now_v7().to_string()).is_ok());
    }
}
