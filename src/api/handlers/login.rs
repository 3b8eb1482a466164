use crate::api::{
    auth::Auth,
    error::{ApiError, ErrorBody},
};
use axum::{extract::rejection::JsonRejection, extract::Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

pub const TOKEN_TYPE: &str = "bearer";

#[derive(ToSchema, Serialize, Deserialize)]
pub struct LoginRequest {
    password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("password", &"***")
            .finish()
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
}

#[utoipa::path(
    post,
    path= "/api/auth/login",
    request_body = LoginRequest,
    responses (
        (status = 200, description = "Admin token issued", body = LoginResponse, content_type = "application/json"),
        (status = 401, description = "Invalid password", body = ErrorBody),
        (status = 422, description = "Missing password", body = ErrorBody),
    ),
    tag= "auth"
)]
// axum handler for admin login
#[instrument(skip(auth, payload))]
pub async fn login(
    auth: Extension<Arc<Auth>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;

    let access_token = auth.issue_token(&request.password).map_err(|err| {
        warn!("Admin login failed: {err}");
        ApiError::from(err)
    })?;

    info!("Admin token issued");

    Ok(Json(LoginResponse {
        access_token,
        token_type: TOKEN_TYPE.to_string(),
    }))
}
