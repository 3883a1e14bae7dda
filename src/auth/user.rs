//! User accounts as seen by the rest of the crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Citizen,
    Reviewer,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Citizen => "CITIZEN",
            Self::Reviewer => "REVIEWER",
            Self::Admin => "ADMIN",
        }
    }

    /// Reviewers and admins may act on registrations they did not submit.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Reviewer | Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "CITIZEN" => Ok(Self::Citizen),
            "REVIEWER" => Ok(Self::Reviewer),
            "ADMIN" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A user account without its password digest. This is the only user shape that
/// leaves the credential store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone_number: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// User row including the password digest; consumed only by the login path.
#[derive(Clone)]
pub struct StoredUser {
    pub user: User,
    pub password_hash: String,
}

impl fmt::Debug for StoredUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredUser")
            .field("user", &self.user)
            .field("password_hash", &"***")
            .finish()
    }
}

/// Data needed to persist a new account.
#[derive(Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone_number: String,
    pub role: Role,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("password_hash", &"***")
            .field("full_name", &self.full_name)
            .field("phone_number", &self.phone_number)
            .field("role", &self.role)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn role_round_trips_through_str() -> Result<()> {
        for role in [Role::Citizen, Role::Reviewer, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().map_err(anyhow::Error::msg)?, role);
        }
        assert!("citizen".parse::<Role>().is_err());
        Ok(())
    }

    #[test]
    fn stored_user_debug_hides_digest() {
        let stored = StoredUser {
            user: User {
                id: Uuid::nil(),
                email: "a@example.com".to_string(),
                full_name: "A".to_string(),
                phone_number: "1".to_string(),
                role: Role::Citizen,
                created_at: Utc::now(),
            },
            password_hash: "$argon2id$secret".to_string(),
        };
        let rendered = format!("{stored:?}");
        assert!(!rendered.contains("argon2id"));
    }

    #[test]
    fn user_serializes_camel_case_without_password() -> Result<()> {
        let user = User {
            id: Uuid::nil(),
            email: "a@example.com".to_string(),
            full_name: "Ada".to_string(),
            phone_number: "555".to_string(),
            role: Role::Reviewer,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&user)?;
        assert_eq!(value["fullName"], "Ada");
        assert_eq!(value["role"], "REVIEWER");
        assert!(value.get("password").is_none());
        assert!(value.get("passwordHash").is_none());
        Ok(())
    }
}
