//! Registration lifecycle: submission, scoped reads, and reviewer decisions.
//!
//! Authorization is decided by the caller through [`super::policy`]; this
//! service trusts the scope it is asked for. The `_for_user` reads are the
//! ownership boundary and report a foreign registration as `NotFound`.

use super::{NewOwner, NewVehicle, Registration, RegistrationStatus, RegistrationStub, StatusChange};
use crate::{
    error::{Error, Result},
    store::{RegistrationRepository, StoreError, TransitionOutcome},
};
use chrono::{DateTime, Utc};
use std::{fmt, sync::Arc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct RegistrationService {
    repo: Arc<dyn RegistrationRepository>,
}

impl fmt::Debug for RegistrationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationService").finish_non_exhaustive()
    }
}

impl RegistrationService {
    #[must_use]
    pub fn new(repo: Arc<dyn RegistrationRepository>) -> Self {
        Self { repo }
    }

    /// Persist owner, vehicle, and a `PENDING` registration as one unit.
    ///
    /// # Errors
    /// [`Error::InvalidReference`] when `user_id` names no user.
    pub async fn submit(
        &self,
        user_id: Uuid,
        owner: NewOwner,
        vehicle: NewVehicle,
    ) -> Result<Registration> {
        self.submit_at(user_id, owner, vehicle, Utc::now()).await
    }

    #[instrument(skip(self, owner, vehicle))]
    pub(crate) async fn submit_at(
        &self,
        user_id: Uuid,
        owner: NewOwner,
        vehicle: NewVehicle,
        submitted_at: DateTime<Utc>,
    ) -> Result<Registration> {
        let registration = self
            .repo
            .create_registration_bundle(
                owner,
                vehicle,
                RegistrationStub {
                    user_id,
                    submitted_at,
                },
            )
            .await
            .map_err(|err| match err {
                StoreError::ForeignKeyViolation => {
                    warn!("Registration submitted for unknown user");
                    Error::InvalidReference
                }
                other => Error::infrastructure(other),
            })?;

        info!(registration_id = %registration.id, "Registration submitted");

        Ok(registration)
    }

    /// Every registration, newest first. Reviewer scope only.
    ///
    /// # Errors
    /// Store failures surface as [`Error::Infrastructure`].
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Registration>> {
        self.repo.list_all().await.map_err(Error::infrastructure)
    }

    /// # Errors
    /// Store failures surface as [`Error::Infrastructure`].
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Registration>> {
        self.repo
            .list_for_user(user_id)
            .await
            .map_err(Error::infrastructure)
    }

    /// # Errors
    /// [`Error::NotFound`] when no registration has this id.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<Registration> {
        self.repo
            .find_registration(id)
            .await
            .map_err(Error::infrastructure)?
            .ok_or(Error::NotFound)
    }

    /// # Errors
    /// [`Error::NotFound`] unless the registration exists and belongs to
    /// `user_id`.
    #[instrument(skip(self))]
    pub async fn get_by_id_for_user(&self, id: Uuid, user_id: Uuid) -> Result<Registration> {
        self.repo
            .find_registration_for_user(id, user_id)
            .await
            .map_err(Error::infrastructure)?
            .ok_or(Error::NotFound)
    }

    /// Record a reviewer decision on a `PENDING` registration.
    ///
    /// `rejection_reason` is kept only for `REJECTED`.
    ///
    /// # Errors
    /// [`Error::NotFound`] for an unknown id and [`Error::InvalidTransition`]
    /// when the target is `PENDING` or the registration was already decided.
    #[instrument(skip(self, rejection_reason))]
    pub async fn update_status(
        &self,
        id: Uuid,
        status: RegistrationStatus,
        rejection_reason: Option<String>,
    ) -> Result<Registration> {
        if !status.is_terminal() {
            let current = self.get_by_id(id).await?;
            return Err(Error::InvalidTransition {
                from: current.status,
                to: status,
            });
        }

        let change = StatusChange {
            status,
            rejection_reason: if status == RegistrationStatus::Rejected {
                rejection_reason
            } else {
                None
            },
            reviewed_at: Utc::now(),
        };

        match self
            .repo
            .transition_status(id, change)
            .await
            .map_err(Error::infrastructure)?
        {
            TransitionOutcome::Updated(registration) => {
                info!(registration_id = %id, status = %status, "Registration reviewed");
                Ok(registration)
            }
            TransitionOutcome::NotFound => Err(Error::NotFound),
            TransitionOutcome::Rejected(from) => {
                warn!(registration_id = %id, %from, to = %status, "Illegal status transition");
                Err(Error::InvalidTransition { from, to: status })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{NewUser, Role},
        store::{CredentialStore, FailPoint, MemoryStore},
    };
    use anyhow::Result;
    use chrono::TimeDelta;

    fn owner(name: &str) -> NewOwner {
        NewOwner {
            full_name: name.to_string(),
            national_id: format!("ID-{name}"),
            phone_number: "555-0100".to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            address: "1 Main St".to_string(),
        }
    }

    fn vehicle(plate: &str) -> NewVehicle {
        NewVehicle {
            plate_number: plate.to_string(),
            make: "Toyota".to_string(),
            model: "Corolla".to_string(),
            year: 2020,
            color: "Blue".to_string(),
            chassis_number: format!("CH-{plate}"),
            engine_number: format!("EN-{plate}"),
            vehicle_type: "SEDAN".to_string(),
        }
    }

    async fn user(store: &MemoryStore, email: &str, role: Role) -> Result<Uuid> {
        let user = store
            .insert_user(NewUser {
                email: email.to_string(),
                password_hash: "$argon2id$stub".to_string(),
                full_name: email.to_string(),
                phone_number: "555".to_string(),
                role,
            })
            .await?;
        Ok(user.id)
    }

    fn service(store: &Arc<MemoryStore>) -> RegistrationService {
        RegistrationService::new(store.clone())
    }

    #[tokio::test]
    async fn submit_creates_pending_joined_registration() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let alice = user(&store, "alice@example.com", Role::Citizen).await?;

        let registration = service(&store)
            .submit(alice, owner("Alice"), vehicle("ABC-123"))
            .await?;

        assert_eq!(registration.status, RegistrationStatus::Pending);
        assert_eq!(registration.user_id, alice);
        assert!(registration.reviewed_at.is_none());
        assert!(registration.rejection_reason.is_none());
        assert_eq!(registration.owner.full_name, "Alice");
        assert_eq!(registration.vehicle.plate_number, "ABC-123");
        assert_eq!(
            registration.user.as_ref().map(|user| user.id),
            Some(alice)
        );
        assert_eq!(store.row_counts().await, (1, 1, 1));
        Ok(())
    }

    #[tokio::test]
    async fn failed_bundle_leaves_no_rows() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let alice = user(&store, "alice@example.com", Role::Citizen).await?;
        let registrations = service(&store);

        for point in [FailPoint::AfterOwnerInsert, FailPoint::AfterVehicleInsert] {
            store.fail_next_bundle_at(point).await;
            let result = registrations
                .submit(alice, owner("Alice"), vehicle("ABC-123"))
                .await;
            assert!(matches!(result, Err(Error::Infrastructure(_))));
            assert_eq!(store.row_counts().await, (0, 0, 0));
        }

        // The fail point is one-shot.
        registrations
            .submit(alice, owner("Alice"), vehicle("ABC-123"))
            .await?;
        assert_eq!(store.row_counts().await, (1, 1, 1));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_user_is_an_invalid_reference() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let result = service(&store)
            .submit(Uuid::now_v7(), owner("Ghost"), vehicle("GHO-001"))
            .await;

        assert!(matches!(result, Err(Error::InvalidReference)));
        assert_eq!(store.row_counts().await, (0, 0, 0));
        Ok(())
    }

    #[tokio::test]
    async fn lists_are_newest_first_and_scoped() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let alice = user(&store, "alice@example.com", Role::Citizen).await?;
        let bob = user(&store, "bob@example.com", Role::Citizen).await?;
        let registrations = service(&store);

        let base = Utc::now();
        let first = registrations
            .submit_at(alice, owner("A1"), vehicle("A-1"), base)
            .await?;
        let second = registrations
            .submit_at(bob, owner("B1"), vehicle("B-1"), base + TimeDelta::seconds(1))
            .await?;
        let third = registrations
            .submit_at(alice, owner("A2"), vehicle("A-2"), base + TimeDelta::seconds(2))
            .await?;

        let all = registrations.list_all().await?;
        let ids: Vec<Uuid> = all.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
        assert!(all.iter().all(|r| r.user.is_some()));
        assert!(all
            .windows(2)
            .all(|pair| pair[0].submitted_at > pair[1].submitted_at));

        let mine = registrations.list_for_user(alice).await?;
        let ids: Vec<Uuid> = mine.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![third.id, first.id]);
        assert!(mine.iter().all(|r| r.user.is_none() && r.user_id == alice));
        Ok(())
    }

    #[tokio::test]
    async fn identical_timestamps_keep_creation_order() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let alice = user(&store, "alice@example.com", Role::Citizen).await?;
        let registrations = service(&store);

        let at = Utc::now();
        let older = registrations
            .submit_at(alice, owner("A1"), vehicle("A-1"), at)
            .await?;
        let newer = registrations
            .submit_at(alice, owner("A2"), vehicle("A-2"), at)
            .await?;

        let ids: Vec<Uuid> = registrations
            .list_all()
            .await?
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![newer.id, older.id]);
        Ok(())
    }

    #[tokio::test]
    async fn foreign_registration_reads_as_not_found() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let alice = user(&store, "alice@example.com", Role::Citizen).await?;
        let bob = user(&store, "bob@example.com", Role::Citizen).await?;
        let registrations = service(&store);

        let bobs = registrations
            .submit(bob, owner("Bob"), vehicle("BOB-1"))
            .await?;

        let as_alice = registrations.get_by_id_for_user(bobs.id, alice).await;
        let missing = registrations
            .get_by_id_for_user(Uuid::now_v7(), alice)
            .await;
        assert!(matches!(as_alice, Err(Error::NotFound)));
        assert!(matches!(missing, Err(Error::NotFound)));

        let as_bob = registrations.get_by_id_for_user(bobs.id, bob).await?;
        assert_eq!(as_bob.id, bobs.id);
        assert!(as_bob.user.is_none());

        let unscoped = registrations.get_by_id(bobs.id).await?;
        assert_eq!(unscoped.user.map(|user| user.id), Some(bob));
        assert!(matches!(
            registrations.get_by_id(Uuid::now_v7()).await,
            Err(Error::NotFound)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn approve_then_reject_is_an_invalid_transition() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let alice = user(&store, "alice@example.com", Role::Citizen).await?;
        let registrations = service(&store);
        let submitted = registrations
            .submit(alice, owner("Alice"), vehicle("ABC-123"))
            .await?;

        let approved = registrations
            .update_status(
                submitted.id,
                RegistrationStatus::Approved,
                Some("ignored".to_string()),
            )
            .await?;
        assert_eq!(approved.status, RegistrationStatus::Approved);
        assert!(approved.reviewed_at.is_some());
        assert!(approved.rejection_reason.is_none());

        let again = registrations
            .update_status(
                submitted.id,
                RegistrationStatus::Rejected,
                Some("Blurry documents".to_string()),
            )
            .await;
        assert!(matches!(
            again,
            Err(Error::InvalidTransition {
                from: RegistrationStatus::Approved,
                to: RegistrationStatus::Rejected,
            })
        ));

        let stored = registrations.get_by_id(submitted.id).await?;
        assert_eq!(stored.status, RegistrationStatus::Approved);
        assert_eq!(stored.reviewed_at, approved.reviewed_at);
        Ok(())
    }

    #[tokio::test]
    async fn reject_keeps_reason() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let alice = user(&store, "alice@example.com", Role::Citizen).await?;
        let registrations = service(&store);
        let submitted = registrations
            .submit(alice, owner("Alice"), vehicle("ABC-123"))
            .await?;

        let rejected = registrations
            .update_status(
                submitted.id,
                RegistrationStatus::Rejected,
                Some("Plate mismatch".to_string()),
            )
            .await?;
        assert_eq!(rejected.status, RegistrationStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Plate mismatch"));
        Ok(())
    }

    #[tokio::test]
    async fn pending_is_never_a_target() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let alice = user(&store, "alice@example.com", Role::Citizen).await?;
        let registrations = service(&store);
        let submitted = registrations
            .submit(alice, owner("Alice"), vehicle("ABC-123"))
            .await?;

        let result = registrations
            .update_status(submitted.id, RegistrationStatus::Pending, None)
            .await;
        assert!(matches!(result, Err(Error::InvalidTransition { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn update_unknown_registration_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let result = service(&store)
            .update_status(Uuid::now_v7(), RegistrationStatus::Approved, None)
            .await;
        assert!(matches!(result, Err(Error::NotFound)));
    }

    #[tokio::test]
    async fn concurrent_reviews_have_one_winner() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let alice = user(&store, "alice@example.com", Role::Citizen).await?;
        let registrations = service(&store);
        let submitted = registrations
            .submit(alice, owner("Alice"), vehicle("ABC-123"))
            .await?;
        let id = submitted.id;

        let approve = {
            let registrations = registrations.clone();
            tokio::spawn(async move {
                registrations
                    .update_status(id, RegistrationStatus::Approved, None)
                    .await
            })
        };
        let reject = {
            let registrations = registrations.clone();
            tokio::spawn(async move {
                registrations
                    .update_status(
                        id,
                        RegistrationStatus::Rejected,
                        Some("Duplicate".to_string()),
                    )
                    .await
            })
        };

        let outcomes = [approve.await?, reject.await?];
        let winners = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
        let losers = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, Err(Error::InvalidTransition { .. })))
            .count();
        assert_eq!((winners, losers), (1, 1));
        Ok(())
    }
}
