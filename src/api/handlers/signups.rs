use super::Message;
use crate::api::{
    auth::AdminClaims,
    error::{ApiError, ErrorBody},
    store::{SignupRecord, Store},
};
use axum::{
    extract::{rejection::PathRejection, Extension, Path},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Count {
    pub count: i64,
}

#[utoipa::path(
    get,
    path= "/api/waitlist/list",
    responses (
        (status = 200, description = "All signups, newest first", body = [SignupRecord]),
        (status = 401, description = "Missing, invalid or expired admin token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag= "waitlist"
)]
#[instrument(skip_all)]
pub async fn list(
    _claims: AdminClaims,
    store: Extension<Store>,
) -> Result<Json<Vec<SignupRecord>>, ApiError> {
    Ok(Json(store.list_all().await?))
}

#[utoipa::path(
    get,
    path= "/api/waitlist/count",
    responses (
        (status = 200, description = "Number of signups", body = Count),
    ),
    tag= "waitlist"
)]
#[instrument(skip_all)]
pub async fn count(store: Extension<Store>) -> Result<Json<Count>, ApiError> {
    Ok(Json(Count {
        count: store.count().await?,
    }))
}

#[utoipa::path(
    delete,
    path= "/api/waitlist/delete/{signup_id}",
    params(
        ("signup_id" = i64, Path, description = "Signup id"),
    ),
    responses (
        (status = 200, description = "Signup deleted", body = Message),
        (status = 401, description = "Missing, invalid or expired admin token", body = ErrorBody),
        (status = 404, description = "Signup not found", body = ErrorBody),
        (status = 422, description = "Signup id is not an integer", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag= "waitlist"
)]
#[instrument(skip_all)]
pub async fn delete(
    _claims: AdminClaims,
    store: Extension<Store>,
    signup_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Message>, ApiError> {
    let Path(signup_id) =
        signup_id.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;

    let record = store.delete_by_id(signup_id).await?;

    info!(id = record.id, "Signup deleted");

    Ok(Json(Message {
        message: format!("Signup {} deleted successfully", record.email),
    }))
}
