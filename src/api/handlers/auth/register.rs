use axum::{extract::Extension, http::StatusCode, response::Response, Json};
use std::sync::Arc;
use tracing::instrument;

use super::{state::AuthState, types::RegisterRequest};
use crate::{api::response::ApiResponse, error::AuthError};

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registration successful, data holds the account id", body = ApiResponse),
        (status = 400, description = "Invalid payload or username already taken", body = ApiResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<Response, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::InvalidRequest("Missing payload".to_string()));
    };

    let record = auth_state
        .registrar()
        .register(&request.username, &request.password())
        .await?;

    Ok(
        ApiResponse::ok("User registered successfully.", Some(record.id.to_string()))
            .into_response_with(StatusCode::OK),
    )
}
