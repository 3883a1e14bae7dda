//! Argon2id password hashing.
//!
//! Digests are PHC strings (`$argon2id$v=19$m=...,t=...,p=1$salt$hash`) so the
//! parameters travel with each digest and older hashes keep verifying after the
//! defaults change. Both operations run on the blocking pool.

use crate::error::{Error, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use std::sync::Arc;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{instrument, warn};

/// Recommended Argon2id memory cost in KiB (19 MiB).
pub const DEFAULT_MEMORY_KIB: u32 = 19_456;
pub const DEFAULT_ITERATIONS: u32 = 2;

#[derive(Clone, Debug)]
pub struct PasswordHasher {
    params: Params,
    /// Digest of a random secret, verified against when there is no stored
    /// digest so both login paths pay the same Argon2 cost.
    decoy: Arc<str>,
    #[cfg(test)]
    verifications: Arc<AtomicUsize>,
}

impl PasswordHasher {
    /// # Errors
    /// Returns an error if Argon2 rejects the parameters (for example memory
    /// below 8 KiB or zero iterations).
    pub fn with_params(memory_kib: u32, iterations: u32) -> anyhow::Result<Self> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|err| anyhow::anyhow!("invalid Argon2 parameters: {err}"))?;
        Self::from_params(params)
    }

    fn from_params(params: Params) -> anyhow::Result<Self> {
        let secret = SaltString::generate(&mut OsRng);
        let decoy = argon2_for(&params)
            .hash_password(secret.as_str().as_bytes(), &SaltString::generate(&mut OsRng))
            .map_err(|err| anyhow::anyhow!("failed to build decoy digest: {err}"))?
            .to_string();

        Ok(Self {
            params,
            decoy: Arc::from(decoy),
            #[cfg(test)]
            verifications: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Hash `plaintext` with a fresh random salt.
    ///
    /// # Errors
    /// Any hashing failure is an [`Error::Infrastructure`].
    #[instrument(skip_all)]
    pub async fn hash(&self, plaintext: &str) -> Result<String> {
        let argon2 = argon2_for(&self.params);
        let plaintext = plaintext.to_owned();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(plaintext.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|err| Error::infrastructure(anyhow::anyhow!("failed to hash password: {err}")))
        })
        .await
        .map_err(Error::infrastructure)?
    }

    /// Check `plaintext` against a stored PHC digest.
    ///
    /// A digest that cannot be parsed counts as a mismatch; it is logged so a
    /// corrupted row does not go unnoticed.
    ///
    /// # Errors
    /// Only a failed blocking task is reported as an error.
    #[instrument(skip_all)]
    pub async fn verify(&self, plaintext: &str, digest: &str) -> Result<bool> {
        #[cfg(test)]
        self.verifications.fetch_add(1, Ordering::SeqCst);

        let argon2 = argon2_for(&self.params);
        let plaintext = plaintext.to_owned();
        let digest = digest.to_owned();
        tokio::task::spawn_blocking(move || {
            let Ok(parsed) = PasswordHash::new(&digest) else {
                warn!("Stored password digest is not a valid PHC string");
                return false;
            };
            argon2.verify_password(plaintext.as_bytes(), &parsed).is_ok()
        })
        .await
        .map_err(Error::infrastructure)
    }

    /// Spend one verification on the decoy digest. Always a mismatch.
    ///
    /// # Errors
    /// Only a failed blocking task is reported as an error.
    pub async fn verify_decoy(&self, plaintext: &str) -> Result<()> {
        let decoy = Arc::clone(&self.decoy);
        self.verify(plaintext, &decoy).await.map(|_| ())
    }

    #[cfg(test)]
    pub(crate) fn verification_count(&self) -> usize {
        self.verifications.load(Ordering::SeqCst)
    }
}

fn argon2_for(params: &Params) -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn fast_hasher() -> PasswordHasher {
    PasswordHasher::with_params(1024, 1).expect("1 MiB / 1 iteration are valid Argon2 parameters")
}
