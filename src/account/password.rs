use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Argon2, PasswordHasher as _, PasswordVerifier as _,
};

/// One-way password hashing collaborator.
///
/// Both calls are CPU bound; async callers run them on the blocking pool.
pub trait PasswordHasher: Send + Sync {
    /// # Errors
    /// Returns an error if hashing fails.
    fn hash(&self, password: &str) -> Result<String>;

    /// `Ok(false)` on mismatch. Errors are reserved for unreadable hashes.
    ///
    /// # Errors
    /// Returns an error if `hash` is not a valid PHC string.
    fn verify(&self, password: &str, hash: &str) -> Result<bool>;
}

/// Argon2id with default parameters, PHC encoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Password hashing failed: {e}"))?;
        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed =
            PasswordHash::new(hash).map_err(|e| anyhow!("Invalid password hash format: {e}"))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(anyhow!("Password verification failed: {e}")),
        }
    }
}
