use secrecy::SecretString;

/// Process-wide secrets, read once at startup.
#[derive(Clone)]
pub struct GlobalArgs {
    pub token_secret: SecretString,
    pub mfa_token_secret: SecretString,
    pub totp_key: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(
        token_secret: SecretString,
        mfa_token_secret: SecretString,
        totp_key: SecretString,
    ) -> Self {
        Self {
            token_secret,
            mfa_token_secret,
            totp_key,
        }
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("token_secret", &"***")
            .field("mfa_token_secret", &"***")
            .field("totp_key", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(
            SecretString::from("full".to_string()),
            SecretString::from("pending".to_string()),
            SecretString::from("key".to_string()),
        );
        assert_eq!(args.token_secret.expose_secret(), "full");

        let debug = format!("{args:?}");
        assert!(!debug.contains("full"));
        assert!(!debug.contains("pending"));
        assert!(debug.contains("***"));
    }
}
