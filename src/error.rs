//! Core error taxonomy shared by the authentication and registration services.
//!
//! `InvalidCredentials` and `NotFound` intentionally collapse several causes into a
//! single signal so callers cannot discover existing accounts or registrations.

use crate::registration::RegistrationStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("email is already in use")]
    DuplicateEmail,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    ExpiredToken,
    #[error("vehicle registration not found")]
    NotFound,
    #[error("referenced user does not exist")]
    InvalidReference,
    #[error("cannot transition registration from {from} to {to}")]
    InvalidTransition {
        from: RegistrationStatus,
        to: RegistrationStatus,
    },
    #[error("infrastructure error: {0}")]
    Infrastructure(#[source] anyhow::Error),
}

impl Error {
    /// Stable machine-readable code surfaced to API callers.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DuplicateEmail => "DUPLICATE_EMAIL",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::ExpiredToken => "EXPIRED_TOKEN",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidReference => "INVALID_REFERENCE",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Infrastructure(_) => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn infrastructure(err: impl Into<anyhow::Error>) -> Self {
        Self::Infrastructure(err.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
