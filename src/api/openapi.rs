use utoipa::{
    openapi::{Contact, License},
    OpenApi,
};

use super::{
    handlers::{auth, health},
    response::ApiResponse,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::register::register,
        auth::login::login,
        auth::mfa::generate,
        auth::mfa::setup,
        auth::session::validate,
        auth::session::logout,
    ),
    components(schemas(
        ApiResponse,
        auth::types::RegisterRequest,
        auth::types::LoginRequest,
        auth::types::MfaSetupRequest,
    )),
    tags(
        (name = "auth", description = "Registration, login and session probing"),
        (name = "mfa", description = "TOTP enrolment"),
        (name = "health", description = "Liveness and build information"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    // Use Cargo.toml metadata for the document info.
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.description = optional_str(env!("CARGO_PKG_DESCRIPTION")).map(str::to_string);
    doc.info.contact = cargo_contact();
    doc.info.license = cargo_license();

    doc
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        (
            (!name.is_empty()).then_some(name),
            (!email.is_empty()).then_some(email),
        )
    } else {
        let name = author.trim();
        ((!name.is_empty()).then_some(name), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let doc = openapi();
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));

        let contact = doc.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Team AuthGate"));
            assert_eq!(contact.email.as_deref(), Some("team@authgate.dev"));
        }

        let license = doc.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, "BSD-3-Clause");
        }
    }

    #[test]
    fn openapi_paths() {
        let doc = openapi();
        for path in [
            "/health",
            "/auth/register",
            "/auth/login",
            "/auth/2fa/generate",
            "/auth/2fa/setup",
            "/auth/validate",
            "/auth/logout",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn parse_author_forms() {
        assert_eq!(
            parse_author("Team <team@example.com>"),
            (Some("Team"), Some("team@example.com"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
        assert_eq!(parse_author("<only@example.com>"), (None, Some("only@example.com")));
    }
}
