//! Time-based one-time passwords (RFC 6238) with seeds sealed at rest.

pub mod crypto;
mod service;

pub use crypto::{ChaChaCipher, SecretCipher};
pub use service::{MfaEngine, DEFAULT_ISSUER};
