use anyhow::Context;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::password::PasswordHasher;
use crate::{
    error::AuthError, principal::Principal, store::UserStore, token::Audience, totp::MfaEngine,
};

/// Result of one login attempt. Exactly one token is issued per outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Password and second factor satisfied.
    Success(Principal),
    /// Password satisfied; the account has not finished TOTP enrolment.
    MfaSetupRequired(Principal),
    /// Password satisfied; a TOTP code must be sent with the next attempt.
    TotpRequired(Principal),
}

impl LoginOutcome {
    #[must_use]
    pub fn principal(&self) -> &Principal {
        match self {
            Self::Success(principal)
            | Self::MfaSetupRequired(principal)
            | Self::TotpRequired(principal) => principal,
        }
    }

    /// Audience of the token the caller should issue for this outcome.
    #[must_use]
    pub fn audience(&self) -> Audience {
        match self {
            Self::Success(_) => Audience::Full,
            Self::MfaSetupRequired(_) | Self::TotpRequired(_) => Audience::MfaPending,
        }
    }
}

/// Runs password check then second factor evaluation for one attempt.
pub struct LoginCoordinator {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
    mfa: Arc<MfaEngine>,
}

impl LoginCoordinator {
    #[must_use]
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn PasswordHasher>,
        mfa: Arc<MfaEngine>,
    ) -> Self {
        Self { store, hasher, mfa }
    }

    /// # Errors
    /// `UserNotFound`, `InvalidCredentials`, `TotpInvalid`, or `Internal` for
    /// store, hashing and seed failures.
    #[instrument(skip(self, password, totp))]
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
        totp: Option<&str>,
    ) -> Result<LoginOutcome, AuthError> {
        let account = self
            .store
            .find_by_username(username.trim())
            .await
            .context("Failed to load account")?
            .ok_or(AuthError::UserNotFound)?;

        let hasher = self.hasher.clone();
        let password = SecretString::from(password.expose_secret().to_owned());
        let password_hash = account.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || {
            hasher.verify(password.expose_secret(), &password_hash)
        })
        .await
        .context("Password verification task failed")??;

        if !matches {
            debug!("Password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let principal = Principal::from_record(&account);
        debug!(user_id = %account.id, "Password verified");

        match self.mfa.verify(totp.unwrap_or_default(), &account) {
            Ok(()) => Ok(LoginOutcome::Success(principal)),
            Err(AuthError::MfaNotEnabled) => Ok(LoginOutcome::MfaSetupRequired(principal)),
            Err(AuthError::TotpNotProvided) => Ok(LoginOutcome::TotpRequired(principal)),
            Err(err) => Err(err),
        }
    }
}
