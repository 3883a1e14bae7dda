//! Signing-secret resolution at startup.

use anyhow::{bail, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{fmt, str::FromStr};
use tracing::warn;

/// Used only outside production when no secret was configured.
pub const INSECURE_DEFAULT_SECRET: &str = "CHANGE_ME_JWT_SECRET";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RuntimeMode {
    #[default]
    Development,
    Production,
}

impl RuntimeMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuntimeMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// Pick the token signing secret for `mode`.
///
/// # Errors
/// Fails in production when the secret is missing, blank, or the insecure default.
pub fn resolve_signing_secret(
    configured: Option<SecretString>,
    mode: RuntimeMode,
) -> Result<SecretString> {
    let configured = configured.filter(|secret| !secret.expose_secret().trim().is_empty());

    match (configured, mode) {
        (Some(secret), RuntimeMode::Production)
            if secret.expose_secret() == INSECURE_DEFAULT_SECRET =>
        {
            bail!("The insecure default token secret cannot be used in production")
        }
        (Some(secret), _) => Ok(secret),
        (None, RuntimeMode::Production) => {
            bail!("A token signing secret is required in production (--token-secret)")
        }
        (None, RuntimeMode::Development) => {
            warn!(
                "No token signing secret configured, using the insecure development default; \
                 never run like this in production"
            );
            Ok(SecretString::from(INSECURE_DEFAULT_SECRET))
        }
    }
}
