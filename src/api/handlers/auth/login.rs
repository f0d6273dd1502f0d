use anyhow::Context;
use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    cookie::{clear_cookie, token_cookie},
    state::AuthState,
    types::LoginRequest,
};
use crate::{
    account::LoginOutcome,
    api::{
        middleware::{CredentialCarrier, MFA_ACCESS_COOKIE},
        response::ApiResponse,
    },
    error::AuthError,
    token::Audience,
};

/// Envelope status: password accepted, TOTP code required.
pub const STATUS_TOTP_REQUIRED: u16 = 361;
/// Envelope status: password accepted, TOTP enrolment required.
pub const STATUS_MFA_SETUP_REQUIRED: u16 = 362;

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated, FULL token issued", body = ApiResponse),
        (status = 202, description = "Second factor pending, MFA_PENDING token issued. Envelope status 361 asks for a TOTP code, 362 for MFA setup", body = ApiResponse),
        (status = 400, description = "Invalid credentials or payload", body = ApiResponse),
        (status = 403, description = "Incorrect TOTP code", body = ApiResponse),
        (status = 404, description = "User not found", body = ApiResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Response, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::InvalidRequest("Missing payload".to_string()));
    };

    let outcome = auth_state
        .login()
        .login(
            &request.username,
            &request.password(),
            request.totp.as_deref(),
        )
        .await?;

    let audience = outcome.audience();
    let token = auth_state
        .tokens()
        .issue(outcome.principal(), audience)
        .context("Failed to issue token")?;

    let (status, envelope, message) = match outcome {
        LoginOutcome::Success(_) => (StatusCode::OK, StatusCode::OK.as_u16(), "Login successful."),
        LoginOutcome::MfaSetupRequired(_) => (
            StatusCode::ACCEPTED,
            STATUS_MFA_SETUP_REQUIRED,
            "MFA setup required.",
        ),
        LoginOutcome::TotpRequired(_) => (
            StatusCode::ACCEPTED,
            STATUS_TOTP_REQUIRED,
            "One time password required.",
        ),
    };
    debug!(%audience, envelope, "Login outcome");

    let config = auth_state.config();
    let mut headers = HeaderMap::new();
    let data = match config.carrier() {
        CredentialCarrier::Bearer => Some(token),
        CredentialCarrier::Cookie => {
            let cookie = token_cookie(
                config,
                CredentialCarrier::cookie_name(audience),
                &token,
                auth_state.tokens().ttl_seconds(),
            )
            .context("Failed to build token cookie")?;
            headers.append(SET_COOKIE, cookie);

            if audience == Audience::Full {
                let cleared = clear_cookie(config, MFA_ACCESS_COOKIE)
                    .context("Failed to build token cookie")?;
                headers.append(SET_COOKIE, cleared);
            }
            None
        }
    };

    Ok((
        headers,
        ApiResponse::new(envelope, message, data).into_response_with(status),
    )
        .into_response())
}
