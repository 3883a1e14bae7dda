use super::{NewUser, PasswordHasher, Principal, Role, TokenService, User};
use crate::{
    error::{Error, Result},
    store::{CredentialStore, StoreError},
};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

/// Input for [`AuthService::register`]; already shape-checked by the caller.
#[derive(Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone_number: String,
}

impl fmt::Debug for SignUp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUp")
            .field("email", &self.email)
            .field("password", &"***")
            .field("full_name", &self.full_name)
            .field("phone_number", &self.phone_number)
            .finish()
    }
}

/// Returned by both register and login.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user: User,
    pub access_token: String,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    tokens: TokenService,
}

impl fmt::Debug for AuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthService")
            .field("hasher", &self.hasher)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        tokens: TokenService,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
        }
    }

    #[must_use]
    pub const fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Create a citizen account and sign it in.
    ///
    /// # Errors
    /// [`Error::DuplicateEmail`] when the email is taken (exact match).
    #[instrument(skip(self, sign_up), fields(email = %sign_up.email))]
    pub async fn register(&self, sign_up: SignUp) -> Result<AuthSession> {
        let password_hash = self.hasher.hash(&sign_up.password).await?;

        let user = self
            .store
            .insert_user(NewUser {
                email: sign_up.email,
                password_hash,
                full_name: sign_up.full_name,
                phone_number: sign_up.phone_number,
                role: Role::Citizen,
            })
            .await
            .map_err(|err| match err {
                StoreError::UniqueViolation => Error::DuplicateEmail,
                other => Error::infrastructure(other),
            })?;

        info!(user_id = %user.id, "Registered new user");

        self.session_for(user)
    }

    /// # Errors
    /// [`Error::InvalidCredentials`] for an unknown email and for a wrong
    /// password alike.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        let Some(stored) = self
            .store
            .find_by_email(email)
            .await
            .map_err(Error::infrastructure)?
        else {
            debug!("Login for unknown email");
            self.hasher.verify_decoy(password).await?;
            return Err(Error::InvalidCredentials);
        };

        if !self.hasher.verify(password, &stored.password_hash).await? {
            debug!("Login with wrong password");
            return Err(Error::InvalidCredentials);
        }

        self.session_for(stored.user)
    }

    /// Verify a bearer token.
    ///
    /// # Errors
    /// See [`TokenService::verify`].
    pub fn authenticate(&self, token: &str) -> Result<Principal> {
        self.tokens.verify(token)
    }

    fn session_for(&self, user: User) -> Result<AuthSession> {
        let access_token = self.tokens.issue(&Principal {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
        })?;
        Ok(AuthSession { user, access_token })
    }
}
