//! In-process store backed by `tokio::sync::RwLock`.
//!
//! Used by the test suite and handy for local demos. Writes that touch more than
//! one table build their rows first and insert them under a single write lock
//! only when every step succeeds, so readers never observe a partial bundle.
//! A [`FailPoint`] can be armed to abort a bundle mid-way.

use super::{CredentialStore, RegistrationRepository, StoreError, TransitionOutcome};
use crate::{
    auth::{NewUser, StoredUser, User},
    registration::{
        NewOwner, NewVehicle, Owner, Registration, RegistrationStatus, RegistrationStub,
        StatusChange, Vehicle,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Where an armed bundle write aborts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailPoint {
    AfterOwnerInsert,
    AfterVehicleInsert,
}

#[derive(Clone, Debug)]
struct RegistrationRow {
    id: Uuid,
    user_id: Uuid,
    owner_id: Uuid,
    vehicle_id: Uuid,
    status: RegistrationStatus,
    rejection_reason: Option<String>,
    submitted_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, StoredUser>,
    owners: HashMap<Uuid, Owner>,
    vehicles: HashMap<Uuid, Vehicle>,
    registrations: HashMap<Uuid, RegistrationRow>,
}

impl Tables {
    fn join(&self, row: &RegistrationRow, with_user: bool) -> Result<Registration, StoreError> {
        // Missing rows here would mean a broken bundle; surface it as a FK failure.
        let owner = self
            .owners
            .get(&row.owner_id)
            .cloned()
            .ok_or(StoreError::ForeignKeyViolation)?;
        let vehicle = self
            .vehicles
            .get(&row.vehicle_id)
            .cloned()
            .ok_or(StoreError::ForeignKeyViolation)?;
        let user = if with_user {
            Some(
                self.users
                    .get(&row.user_id)
                    .map(|stored| stored.user.clone())
                    .ok_or(StoreError::ForeignKeyViolation)?,
            )
        } else {
            None
        };

        Ok(Registration {
            id: row.id,
            user_id: row.user_id,
            owner_id: row.owner_id,
            vehicle_id: row.vehicle_id,
            status: row.status,
            rejection_reason: row.rejection_reason.clone(),
            submitted_at: row.submitted_at,
            reviewed_at: row.reviewed_at,
            user,
            owner,
            vehicle,
        })
    }

    fn newest_first<'a>(
        &self,
        rows: impl Iterator<Item = &'a RegistrationRow>,
        with_user: bool,
    ) -> Result<Vec<Registration>, StoreError> {
        let mut rows: Vec<&RegistrationRow> = rows.collect();
        rows.sort_by(|a, b| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        rows.into_iter()
            .map(|row| self.join(row, with_user))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_point: Mutex<Option<FailPoint>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot failure for the next registration bundle.
    pub async fn fail_next_bundle_at(&self, point: FailPoint) {
        *self.fail_point.lock().await = Some(point);
    }

    /// Row counts for `(owners, vehicles, registrations)`.
    pub async fn row_counts(&self) -> (usize, usize, usize) {
        let tables = self.tables.read().await;
        (
            tables.owners.len(),
            tables.vehicles.len(),
            tables.registrations.len(),
        )
    }

    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|stored| stored.user.email == email)
            .cloned())
    }

    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|stored| stored.user.email == user.email)
        {
            return Err(StoreError::UniqueViolation);
        }

        let created = User {
            id: Uuid::now_v7(),
            email: user.email,
            full_name: user.full_name,
            phone_number: user.phone_number,
            role: user.role,
            created_at: Utc::now(),
        };
        tables.users.insert(
            created.id,
            StoredUser {
                user: created.clone(),
                password_hash: user.password_hash,
            },
        );
        Ok(created)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl RegistrationRepository for MemoryStore {
    #[instrument(skip(self, owner, vehicle, stub), fields(user_id = %stub.user_id))]
    async fn create_registration_bundle(
        &self,
        owner: NewOwner,
        vehicle: NewVehicle,
        stub: RegistrationStub,
    ) -> Result<Registration, StoreError> {
        let fail_point = self.fail_point.lock().await.take();
        let mut tables = self.tables.write().await;

        // Nothing touches the live tables until every step has succeeded.
        let owner = owner.into_owner(Uuid::now_v7());
        if fail_point == Some(FailPoint::AfterOwnerInsert) {
            debug!("aborting bundle after owner insert");
            return Err(StoreError::Injected(FailPoint::AfterOwnerInsert));
        }

        let vehicle = vehicle.into_vehicle(Uuid::now_v7());
        if fail_point == Some(FailPoint::AfterVehicleInsert) {
            debug!("aborting bundle after vehicle insert");
            return Err(StoreError::Injected(FailPoint::AfterVehicleInsert));
        }

        let user = tables
            .users
            .get(&stub.user_id)
            .map(|stored| stored.user.clone())
            .ok_or(StoreError::ForeignKeyViolation)?;

        let row = RegistrationRow {
            id: Uuid::now_v7(),
            user_id: stub.user_id,
            owner_id: owner.id,
            vehicle_id: vehicle.id,
            status: RegistrationStatus::Pending,
            rejection_reason: None,
            submitted_at: stub.submitted_at,
            reviewed_at: None,
        };
        let registration = Registration {
            id: row.id,
            user_id: row.user_id,
            owner_id: row.owner_id,
            vehicle_id: row.vehicle_id,
            status: row.status,
            rejection_reason: None,
            submitted_at: row.submitted_at,
            reviewed_at: None,
            user: Some(user),
            owner: owner.clone(),
            vehicle: vehicle.clone(),
        };

        tables.owners.insert(owner.id, owner);
        tables.vehicles.insert(vehicle.id, vehicle);
        tables.registrations.insert(row.id, row);
        Ok(registration)
    }

    async fn list_all(&self) -> Result<Vec<Registration>, StoreError> {
        let tables = self.tables.read().await;
        tables.newest_first(tables.registrations.values(), true)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Registration>, StoreError> {
        let tables = self.tables.read().await;
        tables.newest_first(
            tables
                .registrations
                .values()
                .filter(|row| row.user_id == user_id),
            false,
        )
    }

    async fn find_registration(&self, id: Uuid) -> Result<Option<Registration>, StoreError> {
        let tables = self.tables.read().await;
        tables
            .registrations
            .get(&id)
            .map(|row| tables.join(row, true))
            .transpose()
    }

    async fn find_registration_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, StoreError> {
        let tables = self.tables.read().await;
        tables
            .registrations
            .get(&id)
            .filter(|row| row.user_id == user_id)
            .map(|row| tables.join(row, false))
            .transpose()
    }

    #[instrument(skip(self, change), fields(status = %change.status))]
    async fn transition_status(
        &self,
        id: Uuid,
        change: StatusChange,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(row) = tables.registrations.get_mut(&id) else {
            return Ok(TransitionOutcome::NotFound);
        };
        if row.status != RegistrationStatus::Pending {
            return Ok(TransitionOutcome::Rejected(row.status));
        }

        row.status = change.status;
        row.rejection_reason = change.rejection_reason;
        row.reviewed_at = Some(change.reviewed_at);
        let row = row.clone();

        Ok(TransitionOutcome::Updated(tables.join(&row, true)?))
    }
}
