//! PostgreSQL adapter for the credential store and registration repository.
//!
//! Schema lives in `sql/schema.sql`. Multi-row writes run inside a single
//! transaction; dropping an uncommitted `sqlx::Transaction` rolls it back, so any
//! early return via `?` leaves no partial rows behind.

use super::{CredentialStore, RegistrationRepository, StoreError, TransitionOutcome};
use crate::{
    auth::{NewUser, Role, StoredUser, User},
    registration::{
        NewOwner, NewVehicle, Owner, Registration, RegistrationStatus, RegistrationStub,
        StatusChange, Vehicle,
    },
};
use anyhow::Context;
use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Connection, PgPool, Row,
};
use std::{str::FromStr, time::Duration};
use tracing::{info_span, instrument, Instrument};
use uuid::Uuid;

const SQLSTATE_UNIQUE_VIOLATION: &str = "23505";
const SQLSTATE_FOREIGN_KEY_VIOLATION: &str = "23503";

const SELECT_REGISTRATION: &str = r"
    SELECT
        r.id, r.user_id, r.owner_id, r.vehicle_id, r.status,
        r.rejection_reason, r.submitted_at, r.reviewed_at,
        o.full_name AS owner_full_name, o.national_id AS owner_national_id,
        o.phone_number AS owner_phone_number, o.email AS owner_email,
        o.address AS owner_address,
        v.plate_number, v.make, v.model, v.year, v.color,
        v.chassis_number, v.engine_number, v.vehicle_type,
        u.email AS user_email, u.full_name AS user_full_name,
        u.phone_number AS user_phone_number, u.role AS user_role,
        u.created_at AS user_created_at
    FROM vehicle_registrations r
    JOIN owners o ON o.id = r.owner_id
    JOIN vehicles v ON v.id = r.vehicle_id
    JOIN users u ON u.id = r.user_id
";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool against `dsn`.
    ///
    /// # Errors
    /// Returns an error if the first connection cannot be established.
    pub async fn connect(dsn: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(max_connections)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        Ok(Self::new(pool))
    }
}

fn db_span(operation: &'static str, statement: &str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

/// Map SQLSTATE codes onto the store's constraint errors.
fn classify(err: sqlx::Error) -> StoreError {
    let code = match &err {
        sqlx::Error::Database(db_err) => db_err.code().map(|code| code.to_string()),
        _ => None,
    };
    match code.as_deref() {
        Some(SQLSTATE_UNIQUE_VIOLATION) => StoreError::UniqueViolation,
        Some(SQLSTATE_FOREIGN_KEY_VIOLATION) => StoreError::ForeignKeyViolation,
        _ => StoreError::Database(err),
    }
}

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>()
        .map_err(|err| StoreError::Database(sqlx::Error::Decode(err.into())))
}

fn user_from_row(row: &PgRow) -> Result<StoredUser, StoreError> {
    Ok(StoredUser {
        user: User {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            full_name: row.try_get("full_name")?,
            phone_number: row.try_get("phone_number")?,
            role: parse_column::<Role>(row, "role")?,
            created_at: row.try_get("created_at")?,
        },
        password_hash: row.try_get("password_hash")?,
    })
}

fn registration_from_row(row: &PgRow, with_user: bool) -> Result<Registration, StoreError> {
    let user_id: Uuid = row.try_get("user_id")?;
    let owner_id: Uuid = row.try_get("owner_id")?;
    let vehicle_id: Uuid = row.try_get("vehicle_id")?;

    let user = if with_user {
        Some(User {
            id: user_id,
            email: row.try_get("user_email")?,
            full_name: row.try_get("user_full_name")?,
            phone_number: row.try_get("user_phone_number")?,
            role: parse_column::<Role>(row, "user_role")?,
            created_at: row.try_get("user_created_at")?,
        })
    } else {
        None
    };

    Ok(Registration {
        id: row.try_get("id")?,
        user_id,
        owner_id,
        vehicle_id,
        status: parse_column::<RegistrationStatus>(row, "status")?,
        rejection_reason: row.try_get("rejection_reason")?,
        submitted_at: row.try_get("submitted_at")?,
        reviewed_at: row.try_get("reviewed_at")?,
        user,
        owner: Owner {
            id: owner_id,
            full_name: row.try_get("owner_full_name")?,
            national_id: row.try_get("owner_national_id")?,
            phone_number: row.try_get("owner_phone_number")?,
            email: row.try_get("owner_email")?,
            address: row.try_get("owner_address")?,
        },
        vehicle: Vehicle {
            id: vehicle_id,
            plate_number: row.try_get("plate_number")?,
            make: row.try_get("make")?,
            model: row.try_get("model")?,
            year: row.try_get("year")?,
            color: row.try_get("color")?,
            chassis_number: row.try_get("chassis_number")?,
            engine_number: row.try_get("engine_number")?,
            vehicle_type: row.try_get("vehicle_type")?,
        },
    })
}

async fn fetch_registration<'e, E>(
    executor: E,
    id: Uuid,
) -> Result<Option<Registration>, StoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let query = format!("{SELECT_REGISTRATION} WHERE r.id = $1");
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(executor)
        .instrument(db_span("SELECT", &query))
        .await?;
    row.map(|row| registration_from_row(&row, true)).transpose()
}

#[async_trait]
impl CredentialStore for PgStore {
    #[instrument(skip(self, email))]
    async fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>, StoreError> {
        let query = r"
            SELECT id, email, password_hash, full_name, phone_number, role, created_at
            FROM users
            WHERE email = $1
        ";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;
        row.map(|row| user_from_row(&row)).transpose()
    }

    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let query = r"
            INSERT INTO users (id, email, password_hash, full_name, phone_number, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, password_hash, full_name, phone_number, role, created_at
        ";
        let row = sqlx::query(query)
            .bind(Uuid::now_v7())
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.full_name)
            .bind(&user.phone_number)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .map_err(classify)?;
        user_from_row(&row).map(|stored| stored.user)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        async {
            let mut conn = self.pool.acquire().await?;
            conn.ping().await?;
            Ok(())
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl RegistrationRepository for PgStore {
    #[instrument(skip(self, owner, vehicle, stub), fields(user_id = %stub.user_id))]
    async fn create_registration_bundle(
        &self,
        owner: NewOwner,
        vehicle: NewVehicle,
        stub: RegistrationStub,
    ) -> Result<Registration, StoreError> {
        let mut tx = self.pool.begin().await?;

        let owner_id = Uuid::now_v7();
        let query = r"
            INSERT INTO owners (id, full_name, national_id, phone_number, email, address)
            VALUES ($1, $2, $3, $4, $5, $6)
        ";
        sqlx::query(query)
            .bind(owner_id)
            .bind(&owner.full_name)
            .bind(&owner.national_id)
            .bind(&owner.phone_number)
            .bind(&owner.email)
            .bind(&owner.address)
            .execute(&mut *tx)
            .instrument(db_span("INSERT", query))
            .await
            .map_err(classify)?;

        let vehicle_id = Uuid::now_v7();
        let query = r"
            INSERT INTO vehicles
                (id, plate_number, make, model, year, color,
                 chassis_number, engine_number, vehicle_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ";
        sqlx::query(query)
            .bind(vehicle_id)
            .bind(&vehicle.plate_number)
            .bind(&vehicle.make)
            .bind(&vehicle.model)
            .bind(vehicle.year)
            .bind(&vehicle.color)
            .bind(&vehicle.chassis_number)
            .bind(&vehicle.engine_number)
            .bind(&vehicle.vehicle_type)
            .execute(&mut *tx)
            .instrument(db_span("INSERT", query))
            .await
            .map_err(classify)?;

        let registration_id = Uuid::now_v7();
        let query = r"
            INSERT INTO vehicle_registrations
                (id, user_id, owner_id, vehicle_id, status, submitted_at)
            VALUES ($1, $2, $3, $4, 'PENDING', $5)
        ";
        sqlx::query(query)
            .bind(registration_id)
            .bind(stub.user_id)
            .bind(owner_id)
            .bind(vehicle_id)
            .bind(stub.submitted_at)
            .execute(&mut *tx)
            .instrument(db_span("INSERT", query))
            .await
            .map_err(classify)?;

        let registration = fetch_registration(&mut *tx, registration_id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;

        tx.commit().await?;

        Ok(registration)
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<Registration>, StoreError> {
        let query = format!("{SELECT_REGISTRATION} ORDER BY r.submitted_at DESC, r.id DESC");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?;
        rows.iter()
            .map(|row| registration_from_row(row, true))
            .collect()
    }

    #[instrument(skip(self))]
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Registration>, StoreError> {
        let query = format!(
            "{SELECT_REGISTRATION} WHERE r.user_id = $1 ORDER BY r.submitted_at DESC, r.id DESC"
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?;
        rows.iter()
            .map(|row| registration_from_row(row, false))
            .collect()
    }

    #[instrument(skip(self))]
    async fn find_registration(&self, id: Uuid) -> Result<Option<Registration>, StoreError> {
        fetch_registration(&self.pool, id).await
    }

    #[instrument(skip(self))]
    async fn find_registration_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, StoreError> {
        let query = format!("{SELECT_REGISTRATION} WHERE r.id = $1 AND r.user_id = $2");
        let row = sqlx::query(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?;
        row.map(|row| registration_from_row(&row, false)).transpose()
    }

    #[instrument(skip(self, change), fields(status = %change.status))]
    async fn transition_status(
        &self,
        id: Uuid,
        change: StatusChange,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent reviewers on the same registration.
        let query = "SELECT status FROM vehicle_registrations WHERE id = $1 FOR UPDATE";
        let Some(row) = sqlx::query(query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .instrument(db_span("SELECT", query))
            .await?
        else {
            return Ok(TransitionOutcome::NotFound);
        };

        let current = parse_column::<RegistrationStatus>(&row, "status")?;
        if current != RegistrationStatus::Pending {
            return Ok(TransitionOutcome::Rejected(current));
        }

        let query = r"
            UPDATE vehicle_registrations
            SET status = $2, rejection_reason = $3, reviewed_at = $4
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .bind(change.status.as_str())
            .bind(&change.rejection_reason)
            .bind(change.reviewed_at)
            .execute(&mut *tx)
            .instrument(db_span("UPDATE", query))
            .await
            .map_err(classify)?;

        let registration = fetch_registration(&mut *tx, id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;

        tx.commit().await?;

        Ok(TransitionOutcome::Updated(registration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::{borrow::Cow, error::Error as StdError, fmt};

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    fn db_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(TestDbError { code: Some(code) }))
    }

    #[test]
    fn classify_maps_constraint_sqlstates() {
        assert!(matches!(
            classify(db_error("23505")),
            StoreError::UniqueViolation
        ));
        assert!(matches!(
            classify(db_error("23503")),
            StoreError::ForeignKeyViolation
        ));
        assert!(matches!(
            classify(db_error("40001")),
            StoreError::Database(_)
        ));
        assert!(matches!(
            classify(sqlx::Error::RowNotFound),
            StoreError::Database(_)
        ));
    }

    #[tokio::test]
    async fn ping_fails_when_database_is_unreachable() {
        use sqlx::postgres::PgConnectOptions;

        let options = PgConnectOptions::new()
            .host("127.0.0.1")
            .port(1)
            .username("vehicle_registry")
            .database("vehicle_registry");
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy_with(options);

        let store = PgStore::new(pool);
        assert!(matches!(store.ping().await, Err(StoreError::Database(_))));
    }

    #[test]
    fn select_registration_joins_all_three_tables() {
        for table in ["owners o", "vehicles v", "users u"] {
            assert!(SELECT_REGISTRATION.contains(table));
        }
    }
}
