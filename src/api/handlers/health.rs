use super::Message;
use crate::{api::store::Store, GIT_COMMIT_HASH};
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    status: String,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    timestamp: OffsetDateTime,
}

#[utoipa::path(
    get,
    path= "/",
    responses (
        (status = 200, description = "Service is running", body = Message),
    ),
    tag= "health"
)]
pub async fn root() -> Json<Message> {
    Json(Message {
        message: "Waitlist API is running".to_string(),
    })
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Signup store is reachable", body = Health),
        (status = 503, description = "Signup store is unreachable", body = Health)
    ),
    tag= "health"
)]
// axum handler for health
pub async fn health(method: Method, store: Extension<Store>) -> impl IntoResponse {
    let result = store.ping().await;

    if let Err(err) = &result {
        error!("Signup store health check failed: {}", err);
    }

    let health = Health {
        status: if result.is_ok() {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        timestamp: OffsetDateTime::now_utc(),
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = if GIT_COMMIT_HASH.len() > 7 {
        &GIT_COMMIT_HASH[0..7]
    } else {
        ""
    };

    // Create headers using the map method
    let headers = format!(
        "{}:{}:{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_hash
    )
    .parse::<HeaderValue>()
    .map(|x_app_header_value| {
        debug!("X-App header: {:?}", x_app_header_value);

        let mut headers = HeaderMap::new();

        headers.insert("X-App", x_app_header_value);

        headers
    })
    .map_err(|err| {
        error!("Failed to parse X-App header: {}", err);
    });

    // Unwrap the headers or provide a default value (empty headers) in case of an error
    let headers = headers.unwrap_or_else(|()| HeaderMap::new());

    if result.is_ok() {
        (StatusCode::OK, headers, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}
