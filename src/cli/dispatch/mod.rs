//! Map validated CLI arguments to the action to run.

use crate::cli::{
    actions::{Action, server::Args},
    commands::auth,
    globals::GlobalArgs,
};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .filter(|v| !v.trim().is_empty());

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        globals: GlobalArgs::new(
            auth_opts.token_secret,
            auth_opts.mfa_token_secret,
            auth_opts.totp_key,
        ),
        token_ttl_seconds: auth_opts.token_ttl_seconds,
        issuer: auth_opts.issuer,
        carrier: auth_opts.carrier,
        secure_cookies: auth_opts.secure_cookies,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::middleware::CredentialCarrier, cli::commands};
    use secrecy::ExposeSecret;

    #[test]
    fn server_action_from_env() {
        temp_env::with_vars(
            [
                ("AUTHGATE_PORT", Some("9000")),
                ("AUTHGATE_DSN", Some("")),
                ("AUTHGATE_TOKEN_SECRET", Some("full-secret")),
                ("AUTHGATE_MFA_TOKEN_SECRET", Some("mfa-secret")),
                ("AUTHGATE_TOTP_KEY", Some("a2V5")),
                ("AUTHGATE_TOKEN_TTL", None),
                ("AUTHGATE_ISSUER", Some("Example")),
                ("AUTHGATE_CREDENTIAL_CARRIER", Some("bearer")),
                ("AUTHGATE_INSECURE_COOKIES", Some("true")),
            ],
            || {
                let matches = commands::new().get_matches_from(vec!["authgate"]);
                let action = handler(&matches);
                assert!(action.is_ok());
                if let Ok(Action::Server(args)) = action {
                    assert_eq!(args.port, 9000);
                    assert_eq!(args.dsn, None);
                    assert_eq!(args.globals.token_secret.expose_secret(), "full-secret");
                    assert_eq!(args.globals.totp_key.expose_secret(), "a2V5");
                    assert_eq!(args.token_ttl_seconds, 600);
                    assert_eq!(args.issuer, "Example");
                    assert_eq!(args.carrier, CredentialCarrier::Bearer);
                    assert!(!args.secure_cookies);
                }
            },
        );
    }

    #[test]
    fn blank_secret_is_rejected() {
        temp_env::with_vars(
            [
                ("AUTHGATE_TOKEN_SECRET", Some("  ")),
                ("AUTHGATE_MFA_TOKEN_SECRET", Some("mfa-secret")),
                ("AUTHGATE_TOTP_KEY", Some("a2V5")),
            ],
            || {
                let matches = commands::new().get_matches_from(vec!["authgate"]);
                assert!(handler(&matches).is_err());
            },
        );
    }
}
