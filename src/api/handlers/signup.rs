use super::valid_email;
use crate::api::{
    error::{ApiError, ErrorBody},
    notifier::Notifier,
    store::{SignupRecord, Store, StoreError},
};
use axum::{extract::rejection::JsonRejection, extract::Extension, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

pub const SIGNUP_MESSAGE: &str = "Successfully joined waitlist! Check your email for confirmation.";

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupRequest {
    email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupResponse {
    pub id: i64,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    pub message: String,
}

impl From<SignupRecord> for SignupResponse {
    fn from(record: SignupRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
            created_at: record.created_at,
            message: SIGNUP_MESSAGE.to_string(),
        }
    }
}

#[utoipa::path(
    post,
    path= "/api/waitlist/signup",
    request_body = SignupRequest,
    responses (
        (status = 201, description = "Joined the waitlist", body = SignupResponse, content_type = "application/json"),
        (status = 400, description = "Email already registered for waitlist", body = ErrorBody),
        (status = 422, description = "Missing or invalid email address", body = ErrorBody),
        (status = 500, description = "Failed to process waitlist signup", body = ErrorBody),
    ),
    tag= "waitlist"
)]
// axum handler for signup
#[instrument(skip(store, notifier, payload))]
pub async fn signup(
    store: Extension<Store>,
    notifier: Extension<Notifier>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;

    if !valid_email(&request.email) {
        return Err(ApiError::Validation(
            "value is not a valid email address".to_string(),
        ));
    }

    // fast path only, the store's unique constraint decides
    if store
        .find_by_email(&request.email)
        .await
        .map_err(signup_failure)?
        .is_some()
    {
        debug!("Email already on the waitlist");
        return Err(ApiError::Conflict);
    }

    let record = store.insert(&request.email).await.map_err(signup_failure)?;

    info!(id = record.id, "New waitlist signup");

    notifier.spawn_welcome(record.email.clone());

    Ok((StatusCode::CREATED, Json(SignupResponse::from(record))))
}

fn signup_failure(err: StoreError) -> ApiError {
    match err {
        StoreError::Database(source) => ApiError::Internal {
            message: "Failed to process waitlist signup",
            source: source.into(),
        },
        other => ApiError::from(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_insert_conflict_is_bad_request() {
        // the pre-check passed but a concurrent signup won the insert
        let err = signup_failure(StoreError::Conflict("a@x.com".to_string()));

        assert!(matches!(err, ApiError::Conflict));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.detail, "Email already registered for waitlist");
    }

    #[tokio::test]
    async fn test_database_failure_is_generic() {
        let response =
            signup_failure(StoreError::Database(sqlx::Error::PoolTimedOut)).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.detail, "Failed to process waitlist signup");
    }
}
