//! Authentication error types.

use thiserror::Error;

/// Errors from the identity gate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No credential, or a credential the gate cannot parse at all
    /// (missing header, wrong scheme, empty token).
    #[error("missing or malformed credential")]
    Unauthenticated,

    /// A well-formed credential that fails verification (bad signature,
    /// wrong claims).
    #[error("invalid credential")]
    InvalidCredential,

    /// A credential whose validity window has passed.
    #[error("credential expired")]
    CredentialExpired,

    /// Username/password pair rejected at login.
    #[error("unknown user or wrong password")]
    BadLogin,

    /// Password hashing failed; not user-correctable.
    #[error("could not hash password: {0}")]
    Hashing(String),

    /// Token encoding failed; not user-correctable.
    #[error("could not issue token: {0}")]
    TokenIssuance(String),
}

impl AuthError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::InvalidCredential => "invalid_credential",
            AuthError::CredentialExpired => "credential_expired",
            AuthError::BadLogin => "bad_login",
            AuthError::Hashing(_) => "hashing_failure",
            AuthError::TokenIssuance(_) => "token_issuance_failure",
        }
    }
}
