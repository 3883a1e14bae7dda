use crate::{
    api::{self, AppServices},
    auth::{resolve_signing_secret, AuthService, PasswordHasher, RuntimeMode, TokenService},
    registration::RegistrationService,
    store::PgStore,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, info};

pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub frontend_origin: String,
    pub max_connections: u32,
    pub environment: RuntimeMode,
    pub token_secret: Option<SecretString>,
    pub token_ttl_seconds: u64,
    pub password_hash_memory_kib: u32,
    pub password_hash_iterations: u32,
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The DSN may embed a password.
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("dsn", &"***")
            .field("frontend_origin", &self.frontend_origin)
            .field("max_connections", &self.max_connections)
            .field("environment", &self.environment)
            .field("token_secret", &self.token_secret.as_ref().map(|_| "***"))
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("password_hash_memory_kib", &self.password_hash_memory_kib)
            .field("password_hash_iterations", &self.password_hash_iterations)
            .finish()
    }
}

/// Wire the services together and run the HTTP server.
///
/// # Errors
/// Returns an error if the signing secret is unusable, the database is
/// unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    info!(environment = %args.environment, "Starting vehicle registry");

    let secret = resolve_signing_secret(args.token_secret, args.environment)?;
    let tokens = TokenService::new(secret, Duration::from_secs(args.token_ttl_seconds));

    let hasher =
        PasswordHasher::with_params(args.password_hash_memory_kib, args.password_hash_iterations)
            .context("Invalid password hashing parameters")?;

    let store = Arc::new(PgStore::connect(&args.dsn, args.max_connections).await?);
    debug!("Database pool ready");

    let services = AppServices {
        auth: Arc::new(AuthService::new(store.clone(), hasher, tokens)),
        registrations: Arc::new(RegistrationService::new(store.clone())),
        store,
    };

    api::new(args.port, &args.frontend_origin, services).await
}
