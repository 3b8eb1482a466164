use crate::api::{auth::AuthError, store::StoreError};
use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

/// Body of every error response.
#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// Malformed request body or email address
    Validation(String),
    /// Email already on the waitlist
    Conflict,
    /// Wrong admin password
    InvalidCredentials,
    /// Missing, invalid, expired or non-admin token
    Unauthorized(AuthError),
    /// Unknown signup id
    NotFound,
    /// Logged; only the public message reaches the client
    Internal {
        message: &'static str,
        source: anyhow::Error,
    },
}

impl ApiError {
    #[must_use]
    pub fn internal(source: anyhow::Error) -> Self {
        Self::Internal {
            message: "Internal server error",
            source,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::Validation(detail) => detail.clone(),
            Self::Conflict => "Email already registered for waitlist".to_string(),
            Self::InvalidCredentials => "Invalid password".to_string(),
            Self::Unauthorized(cause) => match cause {
                AuthError::MissingToken => "Not authenticated",
                AuthError::Expired => "Token has expired",
                AuthError::WrongRole(_) => "Invalid authentication credentials",
                _ => "Invalid token",
            }
            .to_string(),
            Self::NotFound => "Signup not found".to_string(),
            Self::Internal { message, .. } => (*message).to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => Self::Conflict,
            StoreError::NotFound(_) => Self::NotFound,
            StoreError::Database(_) => Self::internal(err.into()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::Signing(_) => Self::internal(err.into()),
            _ => Self::Unauthorized(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal { source, .. } = &self {
            error!("internal error: {:?}", source);
        }

        let status = self.status();
        let body = Json(ErrorBody {
            detail: self.detail(),
        });

        if status == StatusCode::UNAUTHORIZED {
            (
                status,
                [(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"))],
                body,
            )
                .into_response()
        } else {
            (status, body).into_response()
        }
    }
}
