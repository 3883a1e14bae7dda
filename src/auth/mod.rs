//! Password hashing, access tokens, and the account workflows built on them.

pub mod password;
pub mod secret;
pub mod service;
pub mod token;
pub mod user;

pub use password::PasswordHasher;
pub use secret::{resolve_signing_secret, RuntimeMode, INSECURE_DEFAULT_SECRET};
pub use service::{AuthService, AuthSession, SignUp};
pub use token::{Claims, Principal, TokenService, DEFAULT_TOKEN_TTL, MAX_TOKEN_TTL_SECONDS};
pub use user::{NewUser, Role, StoredUser, User};
