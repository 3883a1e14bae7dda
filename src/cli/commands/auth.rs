use crate::auth::{RuntimeMode, MAX_TOKEN_TTL_SECONDS};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use std::fmt;

pub const ARG_ENVIRONMENT: &str = "environment";
pub const ARG_TOKEN_SECRET: &str = "token-secret";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_PASSWORD_HASH_MEMORY_KIB: &str = "password-hash-memory-kib";
pub const ARG_PASSWORD_HASH_ITERATIONS: &str = "password-hash-iterations";

pub struct Options {
    pub environment: RuntimeMode,
    /// Blank values are treated as unset.
    pub token_secret: Option<SecretString>,
    pub token_ttl_seconds: u64,
    pub password_hash_memory_kib: u32,
    pub password_hash_iterations: u32,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("environment", &self.environment)
            .field(
                "token_secret",
                &self.token_secret.as_ref().map(|_| "***"),
            )
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("password_hash_memory_kib", &self.password_hash_memory_kib)
            .field("password_hash_iterations", &self.password_hash_iterations)
            .finish()
    }
}

impl Options {
    /// Parse authentication arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the environment name is unknown.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let environment = match matches.get_one::<String>(ARG_ENVIRONMENT) {
            Some(value) => value
                .parse::<RuntimeMode>()
                .map_err(|err| anyhow::anyhow!(err))?,
            None => RuntimeMode::default(),
        };

        let token_secret = matches
            .get_one::<String>(ARG_TOKEN_SECRET)
            .filter(|value| !value.trim().is_empty())
            .map(|value| SecretString::from(value.clone()));

        Ok(Self {
            environment,
            token_secret,
            token_ttl_seconds: matches
                .get_one::<u64>(ARG_TOKEN_TTL_SECONDS)
                .copied()
                .unwrap_or(3600),
            password_hash_memory_kib: matches
                .get_one::<u32>(ARG_PASSWORD_HASH_MEMORY_KIB)
                .copied()
                .unwrap_or(crate::auth::password::DEFAULT_MEMORY_KIB),
            password_hash_iterations: matches
                .get_one::<u32>(ARG_PASSWORD_HASH_ITERATIONS)
                .copied()
                .unwrap_or(crate::auth::password::DEFAULT_ITERATIONS),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ENVIRONMENT)
                .long("environment")
                .help("Runtime environment: development or production")
                .env("VREG_ENVIRONMENT")
                .default_value("development"),
        )
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long("token-secret")
                .help("HMAC secret used to sign access tokens (required in production)")
                .env("VREG_TOKEN_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long("token-ttl-seconds")
                .help("Access token lifetime in seconds")
                .env("VREG_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_TOKEN_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_PASSWORD_HASH_MEMORY_KIB)
                .long("password-hash-memory-kib")
                .help("Argon2id memory cost in KiB")
                .env("VREG_PASSWORD_HASH_MEMORY_KIB")
                .default_value("19456")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_PASSWORD_HASH_ITERATIONS)
                .long("password-hash-iterations")
                .help("Argon2id iteration count")
                .env("VREG_PASSWORD_HASH_ITERATIONS")
                .default_value("2")
                .value_parser(clap::value_parser!(u32)),
        )
}
