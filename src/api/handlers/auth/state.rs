//! Auth state shared by the handlers and its configuration.

use std::sync::Arc;

use crate::{
    account::{LoginCoordinator, PasswordHasher, Registrar},
    api::middleware::CredentialCarrier,
    store::UserStore,
    token::TokenService,
    totp::MfaEngine,
};

#[derive(Clone, Debug)]
pub struct AuthConfig {
    carrier: CredentialCarrier,
    secure_cookies: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            carrier: CredentialCarrier::Cookie,
            secure_cookies: true,
        }
    }

    #[must_use]
    pub fn with_carrier(mut self, carrier: CredentialCarrier) -> Self {
        self.carrier = carrier;
        self
    }

    /// Drop the `Secure` cookie attribute, for plain HTTP during local development.
    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn carrier(&self) -> CredentialCarrier {
        self.carrier
    }

    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AuthState {
    config: AuthConfig,
    tokens: Arc<TokenService>,
    store: Arc<dyn UserStore>,
    mfa: Arc<MfaEngine>,
    login: LoginCoordinator,
    registrar: Registrar,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        tokens: Arc<TokenService>,
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn PasswordHasher>,
        mfa: Arc<MfaEngine>,
    ) -> Self {
        Self {
            config,
            login: LoginCoordinator::new(store.clone(), hasher.clone(), mfa.clone()),
            registrar: Registrar::new(store.clone(), hasher, mfa.clone()),
            tokens,
            store,
            mfa,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(super) fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub(super) fn store(&self) -> &dyn UserStore {
        self.store.as_ref()
    }

    pub(super) fn mfa(&self) -> &MfaEngine {
        &self.mfa
    }

    pub(super) fn login(&self) -> &LoginCoordinator {
        &self.login
    }

    pub(super) fn registrar(&self) -> &Registrar {
        &self.registrar
    }
}
