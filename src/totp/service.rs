use anyhow::{anyhow, Context};
use secrecy::{ExposeSecret, SecretSlice};
use std::sync::Arc;
use totp_rs::{Algorithm, Secret, TOTP};
use tracing::{debug, instrument};
use url::Url;

use super::crypto::SecretCipher;
use crate::{
    error::AuthError,
    store::{CredentialRecord, MfaRecord, UserStore},
};

pub const DEFAULT_ISSUER: &str = "AuthGate";

const DIGITS: usize = 6;
const SKEW: u8 = 1;
const STEP: u64 = 30;

/// TOTP lifecycle: provision an encrypted seed, hand out the enrolment URI,
/// confirm enrolment, and check codes at login.
pub struct MfaEngine {
    cipher: Arc<dyn SecretCipher>,
    store: Arc<dyn UserStore>,
    issuer: String,
}

impl MfaEngine {
    /// # Errors
    /// Returns an error if the issuer is empty or contains `:`.
    pub fn new(
        cipher: Arc<dyn SecretCipher>,
        store: Arc<dyn UserStore>,
        issuer: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let issuer = issuer.into();
        if issuer.trim().is_empty() || issuer.contains(':') {
            return Err(anyhow!("Issuer must be non-empty and must not contain ':'"));
        }
        Ok(Self {
            cipher,
            store,
            issuer,
        })
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Fresh random seed, encrypted, with MFA still disabled.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if seed generation or encryption fails.
    pub fn provision(&self) -> Result<MfaRecord, AuthError> {
        let seed = SecretSlice::from(
            Secret::generate_secret()
                .to_bytes()
                .map_err(|e| anyhow!("Failed to generate TOTP seed: {e:?}"))?,
        );
        let encrypted_secret = self
            .cipher
            .encrypt(seed.expose_secret())
            .context("Failed to encrypt TOTP seed")?;

        Ok(MfaRecord {
            enabled: false,
            encrypted_secret,
        })
    }

    /// `otpauth://totp/<issuer>:<account id>?secret=<base32 seed>&issuer=<issuer>`
    ///
    /// # Errors
    /// `MfaAlreadyEnabled` once enrolment is confirmed, `Internal` when the
    /// seed is missing or cannot be decrypted.
    #[instrument(skip_all, fields(user_id = %account.id))]
    pub fn challenge_uri(&self, account: &CredentialRecord) -> Result<String, AuthError> {
        let mfa = provisioned(account)?;
        if mfa.enabled {
            return Err(AuthError::MfaAlreadyEnabled);
        }

        let totp = self.totp(mfa, account)?;

        let mut uri = Url::parse("otpauth://totp/").context("Failed to build otpauth URI")?;
        uri.set_path(&format!("{}:{}", self.issuer, account.id));
        uri.query_pairs_mut()
            .append_pair("secret", &totp.get_secret_base32())
            .append_pair("issuer", &self.issuer);

        Ok(uri.into())
    }

    /// Enable MFA if `code` matches the provisioned seed, then persist the account.
    ///
    /// # Errors
    /// `MfaAlreadyEnabled`, `TotpNotProvided`, `TotpInvalid`, or `Internal`
    /// for seed and store failures.
    #[instrument(skip_all, fields(user_id = %account.id))]
    pub async fn confirm_setup(
        &self,
        code: &str,
        account: &mut CredentialRecord,
    ) -> Result<(), AuthError> {
        let mfa = provisioned(account)?;
        if mfa.enabled {
            return Err(AuthError::MfaAlreadyEnabled);
        }

        let code = parse_code(code)?;
        if !self.totp(mfa, account)?.check_current(code).context("System clock error")? {
            debug!("TOTP setup code rejected");
            return Err(AuthError::TotpInvalid);
        }

        if let Some(mfa) = account.mfa.as_mut() {
            mfa.enabled = true;
        }
        self.store
            .save(account)
            .await
            .context("Failed to persist MFA enrolment")?;

        debug!("MFA enabled");
        Ok(())
    }

    /// Check a login code for an account with MFA enabled.
    ///
    /// The enrolment check comes first so an account that never finished setup
    /// always reports `MfaNotEnabled`, whatever code was sent.
    ///
    /// # Errors
    /// `MfaNotEnabled`, `TotpNotProvided`, `TotpInvalid`, or `Internal` when the
    /// seed cannot be decrypted.
    #[instrument(skip_all, fields(user_id = %account.id))]
    pub fn verify(&self, code: &str, account: &CredentialRecord) -> Result<(), AuthError> {
        let mfa = match account.mfa.as_ref() {
            Some(mfa) if mfa.enabled => mfa,
            _ => return Err(AuthError::MfaNotEnabled),
        };

        let code = parse_code(code)?;
        if self.totp(mfa, account)?.check_current(code).context("System clock error")? {
            Ok(())
        } else {
            Err(AuthError::TotpInvalid)
        }
    }

    fn totp(&self, mfa: &MfaRecord, account: &CredentialRecord) -> Result<TOTP, AuthError> {
        let seed = self
            .cipher
            .decrypt(&mfa.encrypted_secret)
            .context("Failed to decrypt TOTP seed")?;

        let totp = TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            SKEW,
            STEP,
            seed.expose_secret().to_vec(),
            Some(self.issuer.clone()),
            account.id.to_string(),
        )
        .map_err(|e| anyhow!("TOTP init error: {e}"))?;

        Ok(totp)
    }
}

impl std::fmt::Debug for MfaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MfaEngine")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

fn provisioned(account: &CredentialRecord) -> Result<&MfaRecord, AuthError> {
    account
        .mfa
        .as_ref()
        .ok_or_else(|| AuthError::Internal(anyhow!("Account has no provisioned TOTP seed")))
}

/// Codes are exactly the digits the authenticator shows; anything else counts as absent.
fn parse_code(code: &str) -> Result<&str, AuthError> {
    let code = code.trim();
    if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AuthError::TotpNotProvided);
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        store::{CreateOutcome, MemoryUserStore},
        totp::crypto::{ChaChaCipher, KEY_LEN},
    };
    use anyhow::Result;

    fn engine() -> Result<(MfaEngine, Arc<MemoryUserStore>)> {
        let store = Arc::new(MemoryUserStore::new());
        let cipher = Arc::new(ChaChaCipher::new(&[9u8; KEY_LEN])?);
        Ok((MfaEngine::new(cipher, store.clone(), DEFAULT_ISSUER)?, store))
    }

    fn account(engine: &MfaEngine) -> Result<CredentialRecord> {
        let mfa = engine.provision()?;
        Ok(CredentialRecord::new(
            "alice".to_string(),
            "hash".to_string(),
            mfa,
        ))
    }

    fn current_code(engine: &MfaEngine, account: &CredentialRecord) -> Result<String> {
        let mfa = account.mfa.as_ref().context("mfa")?;
        Ok(engine.totp(mfa, account)?.generate_current()?)
    }

    fn wrong_code(code: &str) -> String {
        code.chars()
            .map(|c| if c == '0' { '1' } else { '0' })
            .collect()
    }

    #[test]
    fn issuer_with_colon_is_rejected() -> Result<()> {
        let store = Arc::new(MemoryUserStore::new());
        let cipher = Arc::new(ChaChaCipher::new(&[9u8; KEY_LEN])?);
        assert!(MfaEngine::new(cipher.clone(), store.clone(), "Auth:Gate").is_err());
        assert!(MfaEngine::new(cipher, store, " ").is_err());
        Ok(())
    }

    #[test]
    fn provision_starts_disabled_and_encrypted() -> Result<()> {
        let (engine, _) = engine()?;
        let first = engine.provision()?;
        let second = engine.provision()?;
        assert!(!first.enabled);
        assert_ne!(first.encrypted_secret, second.encrypted_secret);
        Ok(())
    }

    #[test]
    fn challenge_uri_format() -> Result<()> {
        let (engine, _) = engine()?;
        let account = account(&engine)?;

        let uri = engine.challenge_uri(&account)?;
        let prefix = format!("otpauth://totp/{DEFAULT_ISSUER}:{}?secret=", account.id);
        assert!(uri.starts_with(&prefix), "{uri}");
        assert!(uri.ends_with(&format!("&issuer={DEFAULT_ISSUER}")));

        let parsed = Url::parse(&uri)?;
        let secret = parsed
            .query_pairs()
            .find(|(k, _)| k == "secret")
            .map(|(_, v)| v.into_owned())
            .context("secret")?;
        let expected = engine
            .totp(account.mfa.as_ref().context("mfa")?, &account)?
            .get_secret_base32();
        assert_eq!(secret, expected);
        Ok(())
    }

    #[test]
    fn verify_requires_enabled_mfa_first() -> Result<()> {
        let (engine, _) = engine()?;
        let account = account(&engine)?;
        let code = current_code(&engine, &account)?;

        assert!(matches!(
            engine.verify(&code, &account),
            Err(AuthError::MfaNotEnabled)
        ));
        assert!(matches!(
            engine.verify("", &account),
            Err(AuthError::MfaNotEnabled)
        ));

        let mut bare = account.clone();
        bare.mfa = None;
        assert!(matches!(
            engine.verify(&code, &bare),
            Err(AuthError::MfaNotEnabled)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn confirm_setup_enables_and_persists() -> Result<()> {
        let (engine, store) = engine()?;
        let mut account = account(&engine)?;
        assert_eq!(store.create(&account).await?, CreateOutcome::Created);

        let code = current_code(&engine, &account)?;
        engine.confirm_setup(&code, &mut account).await?;
        assert!(account.mfa_enabled());

        let stored = store.find_by_id(account.id).await?.context("stored")?;
        assert!(stored.mfa_enabled());

        engine.verify(&code, &stored)?;
        assert!(matches!(
            engine.verify(&wrong_code(&code), &stored),
            Err(AuthError::TotpInvalid)
        ));
        assert!(matches!(
            engine.verify(" ", &stored),
            Err(AuthError::TotpNotProvided)
        ));
        assert!(matches!(
            engine.verify("12ab56", &stored),
            Err(AuthError::TotpNotProvided)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn confirm_setup_rejects_bad_codes() -> Result<()> {
        let (engine, store) = engine()?;
        let mut account = account(&engine)?;
        store.create(&account).await?;

        let code = current_code(&engine, &account)?;
        assert!(matches!(
            engine.confirm_setup(&wrong_code(&code), &mut account).await,
            Err(AuthError::TotpInvalid)
        ));
        assert!(matches!(
            engine.confirm_setup("", &mut account).await,
            Err(AuthError::TotpNotProvided)
        ));
        assert!(!account.mfa_enabled());

        let stored = store.find_by_id(account.id).await?.context("stored")?;
        assert!(!stored.mfa_enabled());
        Ok(())
    }

    #[tokio::test]
    async fn enrolment_cannot_be_repeated() -> Result<()> {
        let (engine, store) = engine()?;
        let mut account = account(&engine)?;
        store.create(&account).await?;

        let code = current_code(&engine, &account)?;
        engine.confirm_setup(&code, &mut account).await?;

        assert!(matches!(
            engine.confirm_setup(&code, &mut account).await,
            Err(AuthError::MfaAlreadyEnabled)
        ));
        assert!(matches!(
            engine.challenge_uri(&account),
            Err(AuthError::MfaAlreadyEnabled)
        ));
        Ok(())
    }

    #[test]
    fn foreign_key_surfaces_as_internal() -> Result<()> {
        let (engine, _) = engine()?;
        let account = account(&engine)?;

        let other = MfaEngine::new(
            Arc::new(ChaChaCipher::new(&[1u8; KEY_LEN])?),
            Arc::new(MemoryUserStore::new()),
            DEFAULT_ISSUER,
        )?;
        assert!(matches!(
            other.challenge_uri(&account),
            Err(AuthError::Internal(_))
        ));
        Ok(())
    }
}
