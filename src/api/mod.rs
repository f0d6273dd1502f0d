//! HTTP surface: routes, authentication layer and server loop.

pub mod handlers;
pub mod middleware;
mod openapi;
pub mod response;

pub use openapi::openapi;

use anyhow::Result;
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{HeaderName, HeaderValue, Request, StatusCode},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{error, field, info, info_span, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

use self::{
    handlers::{auth, health},
    middleware::{authenticate, AuthenticationMiddleware, PathRules},
    response::ApiResponse,
};

pub const SWAGGER_UI_PATH: &str = "/swagger-ui";
pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

/// Path classification for the routes served by [`router`].
#[must_use]
pub fn path_rules() -> PathRules {
    PathRules::default()
        .with_public("/health")
        .with_public("/auth/register")
        .with_public("/auth/login")
        .with_public("/auth/logout")
        .with_public_prefix(SWAGGER_UI_PATH)
        .with_public_prefix("/api-docs")
        .with_mfa_setup("/auth/2fa/generate")
        .with_mfa_setup("/auth/2fa/setup")
}

/// Build the application with every route and layer in place.
///
/// Authentication wraps the matched routes only; unknown paths fall through to
/// a plain 404.
pub fn router(
    auth_state: Arc<auth::AuthState>,
    authentication: Arc<AuthenticationMiddleware>,
) -> Router {
    Router::new()
        .route("/health", get(health::health).options(health::health))
        .route("/auth/register", post(auth::register::register))
        .route("/auth/login", post(auth::login::login))
        .route("/auth/logout", post(auth::session::logout))
        .route("/auth/validate", get(auth::session::validate))
        .route("/auth/2fa/generate", get(auth::mfa::generate))
        .route("/auth/2fa/setup", post(auth::mfa::setup))
        .merge(SwaggerUi::new(SWAGGER_UI_PATH).url(OPENAPI_JSON_PATH, openapi()))
        .route_layer(axum::middleware::from_fn_with_state(
            authentication,
            authenticate,
        ))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(auth_state)),
        )
}

async fn not_found() -> Response {
    ApiResponse::new(StatusCode::NOT_FOUND.as_u16(), "Not Found", None)
        .into_response_with(StatusCode::NOT_FOUND)
}

/// Start the server
/// # Errors
/// Return error if failed to bind or serve
pub async fn new(
    port: u16,
    auth_state: Arc<auth::AuthState>,
    authentication: Arc<AuthenticationMiddleware>,
) -> Result<()> {
    let app = router(auth_state, authentication);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id,
        user_id = field::Empty,
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account::Argon2Hasher,
        api::middleware::{CredentialCarrier, PathClass},
        principal::Principal,
        store::MemoryUserStore,
        token::{Audience, TokenService},
        totp::{crypto::KEY_LEN, ChaChaCipher, MfaEngine, DEFAULT_ISSUER},
    };
    use axum::{body::to_bytes, http::header::COOKIE};
    use secrecy::SecretString;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> anyhow::Result<(Router, Arc<TokenService>)> {
        let store = Arc::new(MemoryUserStore::new());
        let tokens = Arc::new(TokenService::new(
            SecretString::from("full-secret".to_string()),
            SecretString::from("mfa-secret".to_string()),
            600,
        )?);
        let mfa = Arc::new(MfaEngine::new(
            Arc::new(ChaChaCipher::new(&[3u8; KEY_LEN])?),
            store.clone(),
            DEFAULT_ISSUER,
        )?);
        let state = Arc::new(auth::AuthState::new(
            auth::AuthConfig::new(),
            tokens.clone(),
            store,
            Arc::new(Argon2Hasher),
            mfa,
        ));
        let authentication = Arc::new(AuthenticationMiddleware::new(
            tokens.clone(),
            path_rules(),
            CredentialCarrier::Cookie,
        ));
        Ok((router(state, authentication), tokens))
    }

    async fn call(
        router: Router,
        uri: &str,
        cookie: Option<String>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        let response = router.oneshot(builder.body(Body::empty())?).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, serde_json::from_slice(&bytes)?))
    }

    #[tokio::test]
    async fn installed_principal_is_not_authenticated_again() -> anyhow::Result<()> {
        let (app, tokens) = app()?;
        let installed = Principal::new("installed-upstream", ["USER"]);
        let wrapped = app.clone().layer(Extension(installed.clone()));

        let (status, body) = call(wrapped.clone(), "/auth/validate", None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "installed-upstream");

        let other = Principal::new("from-cookie", ["USER"]);
        let stale = tokens.issue_at(&other, Audience::Full, 1_000)?;
        let cookie = Some(format!("access_token={stale}"));

        let (status, body) = call(wrapped, "/auth/validate", cookie.clone()).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "installed-upstream");

        // Same stale cookie without an installed principal.
        let (status, body) = call(app, "/auth/validate", cookie).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 460);

        Ok(())
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() -> anyhow::Result<()> {
        let (app, _) = app()?;
        let (status, body) = call(app, "/nope", None).await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);
        Ok(())
    }

    #[test]
    fn route_classification() {
        let rules = path_rules();
        assert_eq!(rules.classify("/auth/login"), PathClass::Public);
        assert_eq!(rules.classify("/auth/register"), PathClass::Public);
        assert_eq!(rules.classify("/auth/logout"), PathClass::Public);
        assert_eq!(rules.classify("/health"), PathClass::Public);
        assert_eq!(rules.classify(OPENAPI_JSON_PATH), PathClass::Public);
        assert_eq!(rules.classify("/swagger-ui/index.html"), PathClass::Public);
        assert_eq!(rules.classify("/auth/2fa/generate"), PathClass::MfaSetup);
        assert_eq!(rules.classify("/auth/2fa/setup"), PathClass::MfaSetup);
        assert_eq!(rules.classify("/auth/validate"), PathClass::Protected);
    }
}
