//! # AuthGate (authentication gateway)
//!
//! `authgate` issues, verifies and revalidates identity tokens for a downstream
//! application and layers a TOTP second factor on top of password checks.
//!
//! ## Tokens
//!
//! Tokens are stateless HMAC-SHA512 signed bearer credentials with one of two
//! audiences:
//!
//! - **`FULL`:** password and second factor satisfied.
//! - **`MFA_PENDING`:** password satisfied, second factor outstanding. Only
//!   accepted on the MFA setup routes.
//!
//! Each audience is signed with its own secret, so a token minted for one
//! audience never verifies for the other. There is no revocation list; logout
//! only clears the client cookie.
//!
//! ## Second factor
//!
//! Every account receives a TOTP seed at registration. The seed is stored
//! encrypted (`ChaCha20-Poly1305`) and becomes active once the holder proves
//! possession with a valid code.

pub mod account;
pub mod api;
pub mod cli;
pub mod error;
pub mod principal;
pub mod store;
pub mod token;
pub mod totp;

pub use error::AuthError;
pub use principal::Principal;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
    }
}
