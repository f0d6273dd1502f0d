//! Stateless token service.
//!
//! Flow Overview: `issue` encodes the principal into signed claims for one
//! audience; `verify` checks the signature with that audience's secret, then
//! the audience claim, then expiry, and rebuilds the principal from the claims
//! alone. No store lookup happens on verification.

mod error;
pub mod jwt;

pub use error::TokenError;

use anyhow::{bail, Result};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use self::jwt::{sign_hs512, verify_hs512, TokenClaims};
use crate::principal::Principal;

pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 10 * 60;

/// Trust tier of a token. Each audience has its own signing secret.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Audience {
    /// Password and second factor satisfied.
    Full,
    /// Password satisfied, second factor outstanding.
    MfaPending,
}

impl Audience {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::MfaPending => "MFA_PENDING",
        }
    }
}

impl std::fmt::Display for Audience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct TokenService {
    full_secret: SecretString,
    mfa_secret: SecretString,
    ttl_seconds: u64,
}

impl TokenService {
    /// Build the service from the two audience secrets.
    ///
    /// # Errors
    /// Returns an error if a secret is empty, both secrets are equal, or the TTL is zero.
    pub fn new(
        full_secret: SecretString,
        mfa_secret: SecretString,
        ttl_seconds: u64,
    ) -> Result<Self> {
        if full_secret.expose_secret().is_empty() || mfa_secret.expose_secret().is_empty() {
            bail!("token secrets must not be empty");
        }
        if full_secret.expose_secret() == mfa_secret.expose_secret() {
            bail!("FULL and MFA_PENDING token secrets must differ");
        }
        if ttl_seconds == 0 {
            bail!("token TTL must be greater than zero");
        }

        Ok(Self {
            full_secret,
            mfa_secret,
            ttl_seconds,
        })
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    fn secret(&self, audience: Audience) -> &[u8] {
        match audience {
            Audience::Full => self.full_secret.expose_secret().as_bytes(),
            Audience::MfaPending => self.mfa_secret.expose_secret().as_bytes(),
        }
    }

    /// Mint a token for `principal`, valid for the configured TTL from now.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded or signed.
    pub fn issue(&self, principal: &Principal, audience: Audience) -> Result<String, TokenError> {
        self.issue_at(principal, audience, Utc::now().timestamp())
    }

    /// Mint a token as if the current time were `now` (unix seconds).
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded or signed.
    #[instrument(skip(self, principal), fields(subject = principal.identity()))]
    pub fn issue_at(
        &self,
        principal: &Principal,
        audience: Audience,
        now: i64,
    ) -> Result<String, TokenError> {
        let ttl = i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX);
        let claims = TokenClaims {
            sub: principal.identity().to_string(),
            authorities: principal.authorities().iter().cloned().collect(),
            aud: audience.as_str().to_string(),
            iat: now,
            exp: now.saturating_add(ttl),
        };

        debug!("Issuing {} token expiring at {}", audience, claims.exp);

        sign_hs512(self.secret(audience), &claims)
    }

    /// Verify `token` for `audience` and return the embedded principal.
    ///
    /// # Errors
    /// Returns [`TokenError::Expired`] once the expiry has passed, any other
    /// variant when the token is malformed or not signed for `audience`.
    pub fn verify(&self, token: &str, audience: Audience) -> Result<Principal, TokenError> {
        self.verify_at(token, audience, Utc::now().timestamp())
    }

    /// Verify `token` as if the current time were `now` (unix seconds).
    ///
    /// # Errors
    /// See [`TokenService::verify`].
    #[instrument(skip(self, token))]
    pub fn verify_at(
        &self,
        token: &str,
        audience: Audience,
        now: i64,
    ) -> Result<Principal, TokenError> {
        let claims = verify_hs512(token, self.secret(audience))?;

        if claims.aud != audience.as_str() {
            return Err(TokenError::InvalidAudience);
        }
        if claims.sub.is_empty() {
            return Err(TokenError::MissingSubject);
        }
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(Principal::new(claims.sub, claims.authorities))
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("full_secret", &"***")
            .field("mfa_secret", &"***")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}
