//! Request authentication.
//!
//! Every request is classified as public, MFA setup, or protected. Public
//! requests pass straight through. MFA setup paths need an `MFA_PENDING` token,
//! everything else a `FULL` token. The verified [`Principal`] and its
//! [`Audience`] are inserted into the request extensions for the handlers.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, header::COOKIE, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::BTreeSet, str::FromStr, sync::Arc};
use tracing::{debug, Span};

use crate::{error::AuthError, principal::Principal, token::Audience, token::TokenService};

pub const ACCESS_COOKIE: &str = "access_token";
pub const MFA_ACCESS_COOKIE: &str = "mfa_access_token";
pub const MFA_AUTHORIZATION: &str = "x-mfa-authorization";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathClass {
    Public,
    MfaSetup,
    Protected,
}

impl PathClass {
    /// Audience a request on this path must present, `None` for public paths.
    #[must_use]
    pub fn audience(self) -> Option<Audience> {
        match self {
            Self::Public => None,
            Self::MfaSetup => Some(Audience::MfaPending),
            Self::Protected => Some(Audience::Full),
        }
    }
}

/// Immutable path classification, built once at startup.
#[derive(Clone, Debug, Default)]
pub struct PathRules {
    public: BTreeSet<String>,
    public_prefixes: Vec<String>,
    mfa_setup: BTreeSet<String>,
}

impl PathRules {
    #[must_use]
    pub fn with_public(mut self, path: &str) -> Self {
        self.public.insert(path.to_string());
        self
    }

    /// Matches `prefix` itself and anything below `prefix/`.
    #[must_use]
    pub fn with_public_prefix(mut self, prefix: &str) -> Self {
        self.public_prefixes
            .push(prefix.trim_end_matches('/').to_string());
        self
    }

    #[must_use]
    pub fn with_mfa_setup(mut self, path: &str) -> Self {
        self.mfa_setup.insert(path.to_string());
        self
    }

    #[must_use]
    pub fn classify(&self, path: &str) -> PathClass {
        if self.public.contains(path)
            || self.public_prefixes.iter().any(|prefix| {
                path.strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            })
        {
            PathClass::Public
        } else if self.mfa_setup.contains(path) {
            PathClass::MfaSetup
        } else {
            PathClass::Protected
        }
    }
}

/// Where a token is looked for. One carrier per deployment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CredentialCarrier {
    /// `access_token` / `mfa_access_token` cookies.
    #[default]
    Cookie,
    /// `Authorization` / `X-Mfa-Authorization` bearer headers.
    Bearer,
}

impl CredentialCarrier {
    #[must_use]
    pub fn cookie_name(audience: Audience) -> &'static str {
        match audience {
            Audience::Full => ACCESS_COOKIE,
            Audience::MfaPending => MFA_ACCESS_COOKIE,
        }
    }

    #[must_use]
    pub fn header_name(audience: Audience) -> &'static str {
        match audience {
            Audience::Full => AUTHORIZATION.as_str(),
            Audience::MfaPending => MFA_AUTHORIZATION,
        }
    }

    /// Raw token for `audience`, or `None` when absent, malformed or empty.
    #[must_use]
    pub fn extract(self, headers: &HeaderMap, audience: Audience) -> Option<String> {
        match self {
            Self::Cookie => cookie_value(headers, Self::cookie_name(audience)),
            Self::Bearer => bearer_value(headers, Self::header_name(audience)),
        }
    }
}

impl FromStr for CredentialCarrier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cookie" => Ok(Self::Cookie),
            "bearer" => Ok(Self::Bearer),
            other => Err(format!("unknown credential carrier: {other}")),
        }
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn bearer_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

pub struct AuthenticationMiddleware {
    tokens: Arc<TokenService>,
    rules: PathRules,
    carrier: CredentialCarrier,
}

impl AuthenticationMiddleware {
    #[must_use]
    pub fn new(tokens: Arc<TokenService>, rules: PathRules, carrier: CredentialCarrier) -> Self {
        Self {
            tokens,
            rules,
            carrier,
        }
    }

    #[must_use]
    pub fn classify(&self, path: &str) -> PathClass {
        self.rules.classify(path)
    }

    #[must_use]
    pub fn carrier(&self) -> CredentialCarrier {
        self.carrier
    }

    /// `Ok(None)` for public paths, the verified principal otherwise.
    ///
    /// # Errors
    /// `CredentialNotProvided` when the carrier is empty, `TokenInvalid` or
    /// `TokenExpired` from verification.
    pub fn authenticate(
        &self,
        path: &str,
        headers: &HeaderMap,
    ) -> Result<Option<(Principal, Audience)>, AuthError> {
        let Some(audience) = self.classify(path).audience() else {
            return Ok(None);
        };

        let raw = self
            .carrier
            .extract(headers, audience)
            .ok_or(AuthError::CredentialNotProvided)?;

        let principal = self.tokens.verify(&raw, audience)?;

        Ok(Some((principal, audience)))
    }
}

impl std::fmt::Debug for AuthenticationMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationMiddleware")
            .field("rules", &self.rules)
            .field("carrier", &self.carrier)
            .finish_non_exhaustive()
    }
}

/// axum adapter for [`AuthenticationMiddleware`].
pub async fn authenticate(
    State(middleware): State<Arc<AuthenticationMiddleware>>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.extensions().get::<Principal>().is_some() {
        return next.run(request).await;
    }

    match middleware.authenticate(request.uri().path(), request.headers()) {
        Ok(Some((principal, audience))) => {
            Span::current().record("user_id", principal.identity());
            debug!(%audience, "Request authenticated");
            request.extensions_mut().insert(principal);
            request.extensions_mut().insert(audience);
            next.run(request).await
        }
        Ok(None) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}
