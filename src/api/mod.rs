#![allow(clippy::needless_for_each)]

use crate::{
    api::handlers::{health, login, signup, signups},
    cli::{globals::GlobalArgs, telemetry},
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{HeaderName, HeaderValue, Request},
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

pub mod auth;
pub mod error;
pub mod handlers;
pub mod notifier;
pub mod store;

use self::{
    auth::Auth,
    notifier::{Notifier, NotifierConfig},
    store::Store,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::root,
        health::health,
        signup::signup,
        login::login,
        signups::list,
        signups::count,
        signups::delete
    ),
    components(schemas(
        health::Health,
        handlers::Message,
        signup::SignupRequest,
        signup::SignupResponse,
        login::LoginRequest,
        login::LoginResponse,
        signups::Count,
        store::SignupRecord,
        error::ErrorBody
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "waitlist", description = "Waitlist signups"),
        (name = "auth", description = "Admin authentication"),
        (name = "health", description = "Liveness")
    )
)]
struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Build the application router.
///
/// `origins` is the CORS allow-list; every method and header is allowed for them.
pub fn router(
    store: Store,
    auth: Arc<Auth>,
    notifier: Notifier,
    origins: Vec<HeaderValue>,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health).options(health::health))
        .route("/openapi.json", get(|| async { Json(openapi()) }))
        .route("/api/waitlist/signup", post(signup::signup))
        .route("/api/auth/login", post(login::login))
        .route("/api/waitlist/list", get(signups::list))
        .route("/api/waitlist/count", get(signups::count))
        .route("/api/waitlist/delete/:signup_id", delete(signups::delete))
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
                .layer(cors)
                .layer(Extension(auth))
                .layer(Extension(notifier))
                .layer(Extension(store)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, globals: GlobalArgs) -> Result<()> {
    let store = Store::connect(&globals.dsn).await?;

    let auth = Arc::new(Auth::new(
        &globals.secret_key,
        globals.admin_password.clone(),
    ));

    let notifier = Notifier::new(
        NotifierConfig::new(globals.resend_api_key.clone())
            .with_api_url(globals.email_api_url.clone())
            .with_from(globals.email_from.clone())
            .with_timeout(globals.email_timeout),
    )
    .context("Failed to build email client")?;

    if !notifier.config().is_enabled() {
        info!("Email API key not configured, welcome emails are disabled");
    }

    let origins = allowed_origins(&globals.frontend_urls)?;

    let app = router(store, auth, notifier, origins);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", err);
            }
            info!("Gracefully shutdown");
        })
        .await?;

    telemetry::shutdown_tracer();

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
        request_id
    )
}

/// Turn frontend URLs into CORS origin header values (`scheme://host[:port]`).
///
/// # Errors
/// Returns an error if a URL cannot be parsed or has no host.
pub fn allowed_origins(frontend_urls: &[String]) -> Result<Vec<HeaderValue>> {
    frontend_urls
        .iter()
        .map(|frontend_url| frontend_origin(frontend_url))
        .collect()
}

fn frontend_origin(frontend_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_url)
        .with_context(|| format!("Invalid frontend URL: {frontend_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Frontend URL must include a valid host: {frontend_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_origins() {
        let origins = allowed_origins(&[
            "http://localhost:3000/".to_string(),
            "https://chapi.example.com/app".to_string(),
        ])
        .unwrap();

        assert_eq!(
            origins,
            vec!["http://localhost:3000", "https://chapi.example.com"]
        );
    }

    #[test]
    fn test_allowed_origins_invalid() {
        assert!(allowed_origins(&["not a url".to_string()]).is_err());
        assert!(allowed_origins(&["mailto:admin@x.com".to_string()]).is_err());
    }

    #[test]
    fn test_openapi_paths() {
        let doc = openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        for path in [
            "/",
            "/health",
            "/api/waitlist/signup",
            "/api/auth/login",
            "/api/waitlist/list",
            "/api/waitlist/count",
            "/api/waitlist/delete/{signup_id}",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == path),
                "missing path {path}"
            );
        }
    }
}
