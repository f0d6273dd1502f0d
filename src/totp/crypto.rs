use anyhow::{anyhow, bail, Context, Result};
use base64ct::{Base64, Encoding};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretSlice, SecretString};

/// Associated data bound to every encrypted seed.
pub const SEED_AAD: &[u8] = b"authgate:totp-seed:v1";
pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Symmetric AEAD capability used to keep TOTP seeds encrypted at rest.
///
/// Failures are configuration problems (wrong key, corrupt data), not request errors.
pub trait SecretCipher: Send + Sync {
    /// # Errors
    /// Returns an error if encryption fails.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// # Errors
    /// Returns an error if the data is truncated, tampered with, or sealed with another key.
    fn decrypt(&self, data: &[u8]) -> Result<SecretSlice<u8>>;
}

/// `ChaCha20-Poly1305` with a random nonce per seal. Output is `nonce (12 bytes) || ciphertext`.
pub struct ChaChaCipher {
    cipher: ChaCha20Poly1305,
}

impl ChaChaCipher {
    /// # Errors
    /// Returns an error unless `key` is exactly 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_LEN {
            bail!("TOTP key must be {KEY_LEN} bytes, got {}", key.len());
        }
        let cipher = ChaCha20Poly1305::new_from_slice(key)
            .map_err(|e| anyhow!("Invalid TOTP key: {e}"))?;
        Ok(Self { cipher })
    }

    /// Build the cipher from a standard base64 encoded key.
    ///
    /// # Errors
    /// Returns an error if the value is not base64 or does not decode to 32 bytes.
    pub fn from_base64(encoded: &SecretString) -> Result<Self> {
        let key = SecretSlice::from(
            Base64::decode_vec(encoded.expose_secret().trim())
                .map_err(|_| anyhow!("TOTP key is not valid base64"))?,
        );
        Self::new(key.expose_secret())
    }
}

impl SecretCipher for ChaChaCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from(nonce_bytes);

        let payload = Payload {
            msg: plaintext,
            aad: SEED_AAD,
        };

        let ciphertext = self
            .cipher
            .encrypt(&nonce, payload)
            .map_err(|e| anyhow!("Encryption failure: {e}"))?;

        let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);

        Ok(result)
    }

    fn decrypt(&self, data: &[u8]) -> Result<SecretSlice<u8>> {
        if data.len() <= NONCE_LEN {
            bail!("Invalid ciphertext length");
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let nonce_bytes: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .context("Invalid nonce length")?;
        let nonce = Nonce::from(nonce_bytes);

        let payload = Payload {
            msg: ciphertext,
            aad: SEED_AAD,
        };

        let plaintext = self
            .cipher
            .decrypt(&nonce, payload)
            .map_err(|e| anyhow!("Decryption failure: {e}"))?;

        Ok(SecretSlice::from(plaintext))
    }
}

impl std::fmt::Debug for ChaChaCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaChaCipher").field("key", &"***").finish()
    }
}
