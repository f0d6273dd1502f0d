use thiserror::Error;

use crate::error::AuthError;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signing key")]
    InvalidKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid audience")]
    InvalidAudience,
    #[error("missing subject")]
    MissingSubject,
    #[error("token expired")]
    Expired,
}

impl TokenError {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        if err.is_expired() {
            Self::TokenExpired
        } else {
            Self::TokenInvalid
        }
    }
}
