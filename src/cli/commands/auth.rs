use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

use crate::{api::middleware::CredentialCarrier, token::DEFAULT_TOKEN_TTL_SECONDS, totp::DEFAULT_ISSUER};

pub const ARG_TOKEN_SECRET: &str = "token-secret";
pub const ARG_MFA_TOKEN_SECRET: &str = "mfa-token-secret";
pub const ARG_TOTP_KEY: &str = "totp-key";
pub const ARG_TOKEN_TTL: &str = "token-ttl";
pub const ARG_ISSUER: &str = "issuer";
pub const ARG_CREDENTIAL_CARRIER: &str = "credential-carrier";
pub const ARG_INSECURE_COOKIES: &str = "insecure-cookies";

#[derive(Debug)]
pub struct Options {
    pub token_secret: SecretString,
    pub mfa_token_secret: SecretString,
    pub totp_key: SecretString,
    pub token_ttl_seconds: u64,
    pub issuer: String,
    pub carrier: CredentialCarrier,
    pub secure_cookies: bool,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a required secret is missing or empty.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let read_secret = |id: &str| -> Result<SecretString> {
            matches
                .get_one::<String>(id)
                .filter(|v| !v.trim().is_empty())
                .map(|v| SecretString::from(v.clone()))
                .ok_or_else(|| anyhow!("missing required argument: --{id}"))
        };

        let carrier = matches
            .get_one::<String>(ARG_CREDENTIAL_CARRIER)
            .map_or(Ok(CredentialCarrier::default()), |value| value.parse())
            .map_err(|e| anyhow!(e))?;

        Ok(Self {
            token_secret: read_secret(ARG_TOKEN_SECRET)?,
            mfa_token_secret: read_secret(ARG_MFA_TOKEN_SECRET)?,
            totp_key: read_secret(ARG_TOTP_KEY)?,
            token_ttl_seconds: matches
                .get_one::<u64>(ARG_TOKEN_TTL)
                .copied()
                .unwrap_or(DEFAULT_TOKEN_TTL_SECONDS),
            issuer: matches
                .get_one::<String>(ARG_ISSUER)
                .cloned()
                .unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            carrier,
            secure_cookies: !matches.get_flag(ARG_INSECURE_COOKIES),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long(ARG_TOKEN_SECRET)
                .help("HMAC secret for FULL tokens")
                .env("AUTHGATE_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_MFA_TOKEN_SECRET)
                .long(ARG_MFA_TOKEN_SECRET)
                .help("HMAC secret for MFA_PENDING tokens, must differ from --token-secret")
                .env("AUTHGATE_MFA_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_TOTP_KEY)
                .long(ARG_TOTP_KEY)
                .help("Base64 encoded 32-byte key sealing TOTP seeds at rest")
                .env("AUTHGATE_TOTP_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL)
                .long(ARG_TOKEN_TTL)
                .help("Token lifetime in seconds")
                .env("AUTHGATE_TOKEN_TTL")
                .default_value("600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_ISSUER)
                .long(ARG_ISSUER)
                .help("Issuer label shown by authenticator apps")
                .env("AUTHGATE_ISSUER")
                .default_value(DEFAULT_ISSUER),
        )
        .arg(
            Arg::new(ARG_CREDENTIAL_CARRIER)
                .long(ARG_CREDENTIAL_CARRIER)
                .help("Where clients present tokens")
                .env("AUTHGATE_CREDENTIAL_CARRIER")
                .default_value("cookie")
                .value_parser(["cookie", "bearer"]),
        )
        .arg(
            Arg::new(ARG_INSECURE_COOKIES)
                .long(ARG_INSECURE_COOKIES)
                .help("Omit the Secure cookie attribute (plain HTTP development only)")
                .env("AUTHGATE_INSECURE_COOKIES")
                .action(ArgAction::SetTrue),
        )
}
