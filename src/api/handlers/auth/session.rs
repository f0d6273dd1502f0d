use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;

use super::{cookie::clear_cookie, state::AuthState};
use crate::{
    api::{
        middleware::{ACCESS_COOKIE, MFA_ACCESS_COOKIE},
        response::ApiResponse,
    },
    principal::Principal,
};

#[utoipa::path(
    get,
    path = "/auth/validate",
    responses(
        (status = 200, description = "FULL token is valid, data holds the subject", body = ApiResponse),
        (status = 400, description = "Missing, invalid or expired token", body = ApiResponse),
    ),
    tag = "auth"
)]
pub async fn validate(Extension(principal): Extension<Principal>) -> Response {
    ApiResponse::ok("Token is valid.", Some(principal.identity().to_string()))
        .into_response_with(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Token cookies cleared", body = ApiResponse)
    ),
    tag = "auth"
)]
pub async fn logout(auth_state: Extension<Arc<AuthState>>) -> Response {
    // Tokens are stateless; clearing the cookies is all logout can do.
    let mut headers = HeaderMap::new();
    for name in [ACCESS_COOKIE, MFA_ACCESS_COOKIE] {
        match clear_cookie(auth_state.config(), name) {
            Ok(cookie) => {
                headers.append(SET_COOKIE, cookie);
            }
            Err(err) => error!("Failed to build cookie {name}: {err}"),
        }
    }

    (
        headers,
        ApiResponse::ok("Logged out.", None).into_response_with(StatusCode::OK),
    )
        .into_response()
}
