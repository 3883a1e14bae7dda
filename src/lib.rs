//! # Vehicle Registry
//!
//! Citizens register an account, sign in, and submit vehicle registration
//! requests (owner details plus vehicle details). Reviewers and admins
//! list every submission and approve or reject pending ones.
//!
//! ## Authentication
//!
//! Passwords are stored as Argon2id digests. A successful sign-in returns an
//! HMAC-SHA256 signed bearer token that carries the user id, email and role and
//! expires after one hour. Tokens are stateless; there is no revocation.
//!
//! ## Authorization
//!
//! Citizens only ever see their own registrations. A registration owned by
//! somebody else answers `404 Not Found` rather than `403 Forbidden` so that ids
//! cannot be enumerated. Only `REVIEWER` and `ADMIN` may record a decision, and a
//! decision is final: once a registration leaves `PENDING` it never changes again.

pub mod api;
pub mod auth;
pub mod cli;
pub mod error;
pub mod registration;
pub mod store;

pub use error::{Error, Result};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
