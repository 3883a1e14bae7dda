//! Persistence ports and their adapters.
//!
//! The services only see [`CredentialStore`] and [`RegistrationRepository`].
//! Transaction mechanics stay behind these traits: a registration bundle is
//! written atomically, and status transitions check and write in one unit.

pub mod memory;
pub mod postgres;

use crate::{
    auth::{NewUser, StoredUser, User},
    registration::{NewOwner, NewVehicle, Registration, RegistrationStatus, RegistrationStub, StatusChange},
};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use memory::{FailPoint, MemoryStore};
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    UniqueViolation,
    #[error("foreign key constraint violated")]
    ForeignKeyViolation,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("injected failure at {0:?}")]
    Injected(FailPoint),
}

/// Result of a guarded status transition.
#[derive(Debug)]
pub enum TransitionOutcome {
    Updated(Registration),
    NotFound,
    /// The row exists but is no longer `PENDING`.
    Rejected(RegistrationStatus),
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>, StoreError>;

    /// Fails with [`StoreError::UniqueViolation`] when the email is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait RegistrationRepository: Send + Sync {
    /// Persist owner, vehicle, and registration as one unit; either all three
    /// rows become visible or none do.
    async fn create_registration_bundle(
        &self,
        owner: NewOwner,
        vehicle: NewVehicle,
        stub: RegistrationStub,
    ) -> Result<Registration, StoreError>;

    /// All registrations, newest first, with user, owner, and vehicle.
    async fn list_all(&self) -> Result<Vec<Registration>, StoreError>;

    /// Registrations submitted by `user_id`, newest first, without the user.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Registration>, StoreError>;

    async fn find_registration(&self, id: Uuid) -> Result<Option<Registration>, StoreError>;

    async fn find_registration_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, StoreError>;

    /// Apply `change` only if the registration is still `PENDING`, checking
    /// and writing inside one transaction.
    async fn transition_status(
        &self,
        id: Uuid,
        change: StatusChange,
    ) -> Result<TransitionOutcome, StoreError>;
}
