use anyhow::Context;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::password::PasswordHasher;
use crate::{
    error::AuthError,
    store::{CreateOutcome, CredentialRecord, UserStore},
    totp::MfaEngine,
};

/// Creates accounts with a hashed password and a provisioned, disabled TOTP seed.
pub struct Registrar {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
    mfa: Arc<MfaEngine>,
}

impl Registrar {
    #[must_use]
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn PasswordHasher>,
        mfa: Arc<MfaEngine>,
    ) -> Self {
        Self { store, hasher, mfa }
    }

    /// # Errors
    /// `InvalidRequest` for a bad username or empty password, `UsernameTaken`
    /// on conflict, `Internal` for hashing, sealing or store failures.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<CredentialRecord, AuthError> {
        let username = username.trim();
        if !valid_username(username) {
            return Err(AuthError::InvalidRequest(
                "Username must be 3-64 characters of letters, digits, '.', '_' or '-'.".to_string(),
            ));
        }
        if password.expose_secret().is_empty() {
            return Err(AuthError::InvalidRequest("Password is required.".to_string()));
        }

        let hasher = self.hasher.clone();
        let password = SecretString::from(password.expose_secret().to_owned());
        let password_hash =
            tokio::task::spawn_blocking(move || hasher.hash(password.expose_secret()))
                .await
                .context("Password hashing task failed")??;

        let mfa = self.mfa.provision()?;
        let record = CredentialRecord::new(username.to_string(), password_hash, mfa);

        match self
            .store
            .create(&record)
            .await
            .context("Failed to create account")?
        {
            CreateOutcome::Created => {
                debug!(user_id = %record.id, "Account registered");
                Ok(record)
            }
            CreateOutcome::UsernameTaken => Err(AuthError::UsernameTaken),
        }
    }
}

fn valid_username(username: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9_.-]{3,64}$").is_ok_and(|re| re.is_match(username))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account::Argon2Hasher,
        store::MemoryUserStore,
        totp::{crypto::KEY_LEN, ChaChaCipher, DEFAULT_ISSUER},
    };
    use anyhow::Result;

    fn registrar() -> Result<(Registrar, Arc<MemoryUserStore>)> {
        let store = Arc::new(MemoryUserStore::new());
        let mfa = MfaEngine::new(
            Arc::new(ChaChaCipher::new(&[3u8; KEY_LEN])?),
            store.clone(),
            DEFAULT_ISSUER,
        )?;
        Ok((
            Registrar::new(store.clone(), Arc::new(Argon2Hasher), Arc::new(mfa)),
            store,
        ))
    }

    fn pw(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[test]
    fn username_rules() {
        assert!(valid_username("alice"));
        assert!(valid_username("a.b_c-d"));
        assert!(!valid_username("al"));
        assert!(!valid_username("alice smith"));
        assert!(!valid_username("alice@example.com"));
        assert!(!valid_username(&"a".repeat(65)));
    }

    #[tokio::test]
    async fn register_creates_disabled_mfa_record() -> Result<()> {
        let (registrar, store) = registrar()?;
        let record = registrar.register("alice", &pw("pw1")).await?;

        assert!(!record.mfa_enabled());
        assert!(record.mfa.is_some());
        assert_ne!(record.password_hash, "pw1");

        let stored = store.find_by_username("alice").await?.context("stored")?;
        assert_eq!(stored.id, record.id);
        assert!(stored.authorities.contains("USER"));
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_bad_input() -> Result<()> {
        let (registrar, _) = registrar()?;
        registrar.register("alice", &pw("pw1")).await?;

        assert!(matches!(
            registrar.register("alice", &pw("other")).await,
            Err(AuthError::UsernameTaken)
        ));
        assert!(matches!(
            registrar.register("bob", &pw("")).await,
            Err(AuthError::InvalidRequest(_))
        ));
        assert!(matches!(
            registrar.register("x", &pw("pw")).await,
            Err(AuthError::InvalidRequest(_))
        ));
        Ok(())
    }
}
