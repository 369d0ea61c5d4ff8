//! Credential hashing and bearer-token identity gate for SMSVault.
//!
//! Two independent pieces:
//!
//! - [`hash_password`] / [`verify_password`] - salted PBKDF2-SHA256 in PHC
//!   string format, for registration and login.
//! - [`TokenIssuer`] - issues and verifies HS256 bearer tokens binding a
//!   request to a [`UserIdentity`]. Verification has no side effects;
//!   downstream code trusts the returned identity without re-checking.

mod error;
mod password;
mod token;

pub use error::AuthError;
pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenIssuer, UserIdentity};
