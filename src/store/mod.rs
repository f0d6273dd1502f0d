//! User store collaborator: credential records plus their MFA rows.

mod memory;
mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Authority granted to every registered account.
pub const DEFAULT_AUTHORITY: &str = "USER";

/// Second-factor state. `encrypted_secret` is `nonce || ciphertext` of the TOTP seed.
#[derive(Clone, PartialEq, Eq)]
pub struct MfaRecord {
    pub enabled: bool,
    pub encrypted_secret: Vec<u8>,
}

impl std::fmt::Debug for MfaRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MfaRecord")
            .field("enabled", &self.enabled)
            .field("encrypted_secret", &"***")
            .finish()
    }
}

#[derive(Clone)]
pub struct CredentialRecord {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub authorities: BTreeSet<String>,
    pub mfa: Option<MfaRecord>,
}

impl CredentialRecord {
    /// New account with a fresh v7 id and the default authority.
    #[must_use]
    pub fn new(username: String, password_hash: String, mfa: MfaRecord) -> Self {
        Self {
            id: Uuid::now_v7(),
            username,
            password_hash,
            authorities: BTreeSet::from([DEFAULT_AUTHORITY.to_string()]),
            mfa: Some(mfa),
        }
    }

    #[must_use]
    pub fn mfa_enabled(&self) -> bool {
        self.mfa.as_ref().is_some_and(|mfa| mfa.enabled)
    }
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"***")
            .field("authorities", &self.authorities)
            .field("mfa", &self.mfa)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    UsernameTaken,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up an account by its login name.
    async fn find_by_username(&self, username: &str) -> Result<Option<CredentialRecord>>;

    /// Look up an account by its immutable id (the token subject).
    async fn find_by_id(&self, id: Uuid) -> Result<Option<CredentialRecord>>;

    /// Insert a new account unless the username is already in use.
    async fn create(&self, record: &CredentialRecord) -> Result<CreateOutcome>;

    /// Persist changes to an existing account.
    async fn save(&self, record: &CredentialRecord) -> Result<()>;
}
