//! Admin token minting and verification.
//!
//! Flow Overview:
//! 1) `POST /api/auth/login` checks the shared admin password in constant time.
//! 2) On success an HS256 JWT `{role: "admin", iat, exp}` valid for 24 hours is returned.
//! 3) Admin routes extract [`AdminClaims`] from `Authorization: Bearer <token>`.
//!
//! Verification failures keep their cause ([`AuthError::InvalidToken`],
//! [`AuthError::WrongRole`], [`AuthError::Expired`]) even though every one of them
//! is answered with `401`.

use crate::api::error::ApiError;
use anyhow::anyhow;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

pub const ADMIN_ROLE: &str = "admin";
pub const TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminClaims {
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid password")]
    InvalidCredentials,
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("token role is not admin: {0}")]
    WrongRole(String),
    #[error("token expired")]
    Expired,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

pub struct Auth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    admin_password: SecretString,
    ttl_seconds: i64,
}

impl Auth {
    #[must_use]
    pub fn new(secret_key: &SecretString, admin_password: SecretString) -> Self {
        let secret = secret_key.expose_secret().as_bytes();

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            admin_password,
            ttl_seconds: TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Mint an admin token if `password` is the admin password.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidCredentials`] on a wrong password.
    pub fn issue_token(&self, password: &str) -> Result<String, AuthError> {
        self.issue_token_at(password, OffsetDateTime::now_utc())
    }

    /// Same as [`Auth::issue_token`] with an explicit clock.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidCredentials`] on a wrong password.
    pub fn issue_token_at(&self, password: &str, now: OffsetDateTime) -> Result<String, AuthError> {
        if !self.password_matches(password) {
            return Err(AuthError::InvalidCredentials);
        }

        let iat = now.unix_timestamp();
        let claims = AdminClaims {
            role: ADMIN_ROLE.to_string(),
            iat,
            exp: iat + self.ttl_seconds,
        };

        self.sign(&claims)
    }

    /// Check signature, expiry and role of an admin token.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidToken`], [`AuthError::Expired`] or
    /// [`AuthError::WrongRole`].
    pub fn verify_admin(&self, token: &str) -> Result<AdminClaims, AuthError> {
        self.verify_admin_at(token, OffsetDateTime::now_utc())
    }

    /// Same as [`Auth::verify_admin`] with an explicit clock.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidToken`], [`AuthError::Expired`] or
    /// [`AuthError::WrongRole`].
    pub fn verify_admin_at(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<AdminClaims, AuthError> {
        // expiry is checked below against `now`
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let claims = decode::<AdminClaims>(token, &self.decoding_key, &validation)
            .map_err(|err| AuthError::InvalidToken(err.to_string()))?
            .claims;

        if claims.exp <= now.unix_timestamp() {
            return Err(AuthError::Expired);
        }

        if claims.role != ADMIN_ROLE {
            return Err(AuthError::WrongRole(claims.role));
        }

        Ok(claims)
    }

    fn sign(&self, claims: &AdminClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|err| AuthError::Signing(err.to_string()))
    }

    fn password_matches(&self, password: &str) -> bool {
        password
            .as_bytes()
            .ct_eq(self.admin_password.expose_secret().as_bytes())
            .into()
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth")
            .field("encoding_key", &"***")
            .field("decoding_key", &"***")
            .field("admin_password", &"***")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

/// Token from an `Authorization: Bearer <token>` header, if any.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminClaims
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth = parts
            .extensions
            .get::<Arc<Auth>>()
            .cloned()
            .ok_or_else(|| ApiError::internal(anyhow!("auth state not configured")))?;

        let token = bearer_token(&parts.headers).ok_or(AuthError::MissingToken)?;

        auth.verify_admin(token).map_err(|err| {
            debug!("Admin token rejected: {err}");
            ApiError::from(err)
        })
    }
}
