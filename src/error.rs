//! Error kinds shared by the middleware, the login flow and the MFA engine.
//!
//! Every kind maps to an HTTP status and an envelope status. The envelope
//! status carries the custom codes clients branch on (`460` expired token,
//! `461` TOTP required, `462` MFA not set up).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

use crate::api::response::ApiResponse;

/// Envelope status for an expired access token.
pub const STATUS_TOKEN_EXPIRED: u16 = 460;
/// Envelope status when a TOTP code is required but missing.
pub const STATUS_TOTP_NOT_PROVIDED: u16 = 461;
/// Envelope status when the account has no MFA configured yet.
pub const STATUS_MFA_NOT_ENABLED: u16 = 462;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Access token not provided.")]
    CredentialNotProvided,
    #[error("Your access token is invalid.")]
    TokenInvalid,
    #[error("Your access token is expired.")]
    TokenExpired,
    #[error("User not found.")]
    UserNotFound,
    #[error("Invalid credentials provided.")]
    InvalidCredentials,
    #[error("One time password not provided.")]
    TotpNotProvided,
    #[error("Incorrect TOTP provided.")]
    TotpInvalid,
    #[error("Mfa not enabled.")]
    MfaNotEnabled,
    #[error("Mfa already enabled.")]
    MfaAlreadyEnabled,
    #[error("A user with this name already exists.")]
    UsernameTaken,
    #[error("{0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::TotpInvalid => StatusCode::FORBIDDEN,
            Self::MfaAlreadyEnabled => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::CredentialNotProvided
            | Self::TokenInvalid
            | Self::TokenExpired
            | Self::InvalidCredentials
            | Self::TotpNotProvided
            | Self::MfaNotEnabled
            | Self::UsernameTaken
            | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    #[must_use]
    pub fn envelope_status(&self) -> u16 {
        match self {
            Self::TokenExpired => STATUS_TOKEN_EXPIRED,
            Self::TotpNotProvided => STATUS_TOTP_NOT_PROVIDED,
            Self::MfaNotEnabled => STATUS_MFA_NOT_ENABLED,
            _ => self.http_status().as_u16(),
        }
    }

    /// Client-facing summary placed in the envelope `message`.
    #[must_use]
    pub fn summary(&self) -> &'static str {
        match self {
            Self::CredentialNotProvided => {
                "Bad Request: Please provide your access token for authentication."
            }
            Self::TokenInvalid => "Bad Request: Your access token is invalid.",
            Self::TokenExpired => "Bad Request: Your access token is expired.",
            Self::UserNotFound => {
                "Not Found: The username or password you provided were not linked to a user."
            }
            Self::InvalidCredentials => "Bad Request: Please provide valid credentials.",
            Self::TotpNotProvided => "Bad Request: One time password not provided.",
            Self::TotpInvalid => "Forbidden: One time password was incorrect.",
            Self::MfaNotEnabled => "Bad Request: Please set up MFA for your account.",
            Self::MfaAlreadyEnabled => "Conflict: MFA is already set up for your account.",
            Self::UsernameTaken => "Bad Request: The username you provided is taken.",
            Self::InvalidRequest(_) => "Bad Request: The request payload is invalid.",
            Self::Internal(_) => "Internal Server Error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let data = match &self {
            Self::Internal(err) => {
                // Details stay in the logs, never in the response.
                error!("Internal error: {err:#}");
                None
            }
            other => {
                debug!("Request rejected: {other}");
                Some(other.to_string())
            }
        };

        ApiResponse::new(self.envelope_status(), self.summary(), data)
            .into_response_with(self.http_status())
    }
}
