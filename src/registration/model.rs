//! Owners, vehicles, and the registration record that links them to a user.

use crate::auth::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
}

impl RegistrationStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Only `PENDING -> APPROVED` and `PENDING -> REJECTED` are legal.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved) | (Self::Pending, Self::Rejected)
        )
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(format!("unknown registration status: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: Uuid,
    pub full_name: String,
    pub national_id: String,
    pub phone_number: String,
    pub email: String,
    pub address: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewOwner {
    pub full_name: String,
    pub national_id: String,
    pub phone_number: String,
    pub email: String,
    pub address: String,
}

impl NewOwner {
    pub(crate) fn into_owner(self, id: Uuid) -> Owner {
        Owner {
            id,
            full_name: self.full_name,
            national_id: self.national_id,
            phone_number: self.phone_number,
            email: self.email,
            address: self.address,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: Uuid,
    pub plate_number: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub color: String,
    pub chassis_number: String,
    pub engine_number: String,
    pub vehicle_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewVehicle {
    pub plate_number: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub color: String,
    pub chassis_number: String,
    pub engine_number: String,
    pub vehicle_type: String,
}

impl NewVehicle {
    pub(crate) fn into_vehicle(self, id: Uuid) -> Vehicle {
        Vehicle {
            id,
            plate_number: self.plate_number,
            make: self.make,
            model: self.model,
            year: self.year,
            color: self.color,
            chassis_number: self.chassis_number,
            engine_number: self.engine_number,
            vehicle_type: self.vehicle_type,
        }
    }
}

/// The registration row fields fixed at submission time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationStub {
    pub user_id: Uuid,
    pub submitted_at: DateTime<Utc>,
}

/// A registration joined with its owner and vehicle.
///
/// `user` is resolved for staff-facing reads and omitted on the citizen-scoped
/// paths, where the caller already knows who they are.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: Uuid,
    pub user_id: Uuid,
    pub owner_id: Uuid,
    pub vehicle_id: Uuid,
    pub status: RegistrationStatus,
    pub rejection_reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    pub owner: Owner,
    pub vehicle: Vehicle,
}

/// A reviewer decision applied by `transition_status`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusChange {
    pub status: RegistrationStatus,
    pub rejection_reason: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn only_pending_transitions_are_legal() {
        use RegistrationStatus::{Approved, Pending, Rejected};

        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Pending.can_transition_to(Pending));
        for terminal in [Approved, Rejected] {
            assert!(terminal.is_terminal());
            for next in [Pending, Approved, Rejected] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn status_parses_upper_case_only() -> Result<()> {
        assert_eq!(
            "APPROVED"
                .parse::<RegistrationStatus>()
                .map_err(anyhow::Error::msg)?,
            RegistrationStatus::Approved
        );
        assert!("approved".parse::<RegistrationStatus>().is_err());
        Ok(())
    }

    #[test]
    fn new_owner_deserializes_camel_case() -> Result<()> {
        let owner: NewOwner = serde_json::from_value(serde_json::json!({
            "fullName": "A",
            "nationalId": "1",
            "phoneNumber": "555",
            "email": "a@example.com",
            "address": "Main St"
        }))?;
        assert_eq!(owner.national_id, "1");
        Ok(())
    }
}
