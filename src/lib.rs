//! # Waitlist
//!
//! `waitlist` collects email addresses for a product launch. Visitors sign up with
//! an email address, which is stored exactly once and greeted with a welcome email
//! sent in the background. A single admin, authenticated with a shared password,
//! can list and delete signups using a short-lived bearer token.
//!
//! ## Storage
//!
//! Signups live in one table (`waitlist_signups`). Email uniqueness is enforced by
//! a database constraint; the API's existence check only exists to return a
//! friendly error early.
//!
//! ## Admin tokens
//!
//! Tokens are HS256 JWTs carrying `role = "admin"` and a 24 hour expiry. They are
//! never stored, so they cannot be revoked before they expire.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
