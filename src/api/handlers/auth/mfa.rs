//! TOTP enrolment. Both endpoints require an `MFA_PENDING` token.

use anyhow::Context;
use axum::{extract::Extension, http::StatusCode, response::Response, Json};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::{state::AuthState, types::MfaSetupRequest};
use crate::{
    api::response::ApiResponse, error::AuthError, principal::Principal, store::CredentialRecord,
};

#[utoipa::path(
    get,
    path = "/auth/2fa/generate",
    responses(
        (status = 200, description = "Provisioning URI in data", body = ApiResponse),
        (status = 400, description = "Missing, invalid or expired MFA_PENDING token", body = ApiResponse),
        (status = 409, description = "MFA already enabled", body = ApiResponse),
    ),
    tag = "mfa"
)]
#[instrument(skip_all, fields(user_id = principal.identity()))]
pub async fn generate(
    auth_state: Extension<Arc<AuthState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Response, AuthError> {
    let account = load_account(&auth_state, &principal).await?;
    let uri = auth_state.mfa().challenge_uri(&account)?;

    Ok(ApiResponse::ok("Scan the URI with an authenticator app.", Some(uri))
        .into_response_with(StatusCode::OK))
}

#[utoipa::path(
    post,
    path = "/auth/2fa/setup",
    request_body = MfaSetupRequest,
    responses(
        (status = 200, description = "MFA enabled", body = ApiResponse),
        (status = 400, description = "Missing code or token", body = ApiResponse),
        (status = 403, description = "Incorrect TOTP code", body = ApiResponse),
        (status = 409, description = "MFA already enabled", body = ApiResponse),
    ),
    tag = "mfa"
)]
#[instrument(skip_all, fields(user_id = principal.identity()))]
pub async fn setup(
    auth_state: Extension<Arc<AuthState>>,
    Extension(principal): Extension<Principal>,
    payload: Option<Json<MfaSetupRequest>>,
) -> Result<Response, AuthError> {
    let code = payload.map(|Json(request)| request.totp).unwrap_or_default();

    let mut account = load_account(&auth_state, &principal).await?;
    auth_state.mfa().confirm_setup(&code, &mut account).await?;

    Ok(ApiResponse::ok("MFA enabled.", None).into_response_with(StatusCode::OK))
}

/// The token subject is the only source of identity here.
async fn load_account(
    auth_state: &AuthState,
    principal: &Principal,
) -> Result<CredentialRecord, AuthError> {
    let id = Uuid::parse_str(principal.identity()).map_err(|_| AuthError::TokenInvalid)?;
    auth_state
        .store()
        .find_by_id(id)
        .await
        .context("Failed to load account")?
        .ok_or(AuthError::UserNotFound)
}
