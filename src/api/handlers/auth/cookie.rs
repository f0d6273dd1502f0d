use axum::http::{header::InvalidHeaderValue, HeaderValue};

use super::state::AuthConfig;

/// `HttpOnly` cookie carrying `token`, expiring with it.
pub(super) fn token_cookie(
    config: &AuthConfig,
    name: &str,
    token: &str,
    ttl_seconds: u64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{name}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}");
    if config.secure_cookies() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_cookie(
    config: &AuthConfig,
    name: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    token_cookie(config, name, "", 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn cookie_attributes() -> Result<()> {
        let cookie = token_cookie(&AuthConfig::new(), "access_token", "a.b.c", 600)?;
        assert_eq!(
            cookie.to_str()?,
            "access_token=a.b.c; Path=/; HttpOnly; SameSite=Lax; Max-Age=600; Secure"
        );

        let cookie = clear_cookie(
            &AuthConfig::new().with_secure_cookies(false),
            "mfa_access_token",
        )?;
        assert_eq!(
            cookie.to_str()?,
            "mfa_access_token=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
        );
        Ok(())
    }
}
