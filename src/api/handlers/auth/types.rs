//! Request types for auth endpoints.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Current TOTP code, once MFA is enabled.
    #[serde(default)]
    pub totp: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MfaSetupRequest {
    #[serde(default)]
    pub totp: String,
}

impl RegisterRequest {
    pub(super) fn password(&self) -> SecretString {
        SecretString::from(self.password.clone())
    }
}

impl LoginRequest {
    pub(super) fn password(&self) -> SecretString {
        SecretString::from(self.password.clone())
    }
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"***")
            .field("totp", &self.totp.as_ref().map(|_| "***"))
            .finish()
    }
}
