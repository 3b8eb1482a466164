//! Welcome email delivery through the Resend HTTP API.
//!
//! Sending is best effort. The signup handler calls [`Notifier::spawn_welcome`],
//! which runs the request on a detached tokio task and logs the outcome; nothing
//! waits for it, nothing retries it, and a failure never reaches the signup
//! response. Without an API key the notifier only logs that it skipped the email.

use crate::APP_USER_AGENT;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, instrument, Instrument};

pub const DEFAULT_API_URL: &str = "https://api.resend.com/emails";
pub const DEFAULT_FROM: &str = "Waitlist <onboarding@resend.dev>";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
pub const WELCOME_SUBJECT: &str = "Welcome to the Waitlist! 🎉";

const WELCOME_HTML: &str = include_str!("templates/welcome.html");

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("email request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("email provider returned {status}: {body}")]
    Provider { status: u16, body: String },
}

#[derive(Clone, Debug)]
pub struct NotifierConfig {
    api_url: String,
    api_key: SecretString,
    from: String,
    timeout: Duration,
}

impl NotifierConfig {
    #[must_use]
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key,
            from: DEFAULT_FROM.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    #[must_use]
    pub fn from_address(&self) -> &str {
        &self.from
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty()
    }
}

#[derive(Serialize, Debug)]
struct WelcomeEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Clone, Debug)]
pub struct Notifier {
    client: Client,
    config: Arc<NotifierConfig>,
}

impl Notifier {
    /// # Errors
    /// Returns [`NotifyError::Client`] if the HTTP client cannot be built.
    pub fn new(config: NotifierConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.timeout())
            .build()
            .map_err(NotifyError::Client)?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    #[must_use]
    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// Send the welcome email to `email`; a no-op when no API key is configured.
    ///
    /// # Errors
    /// Returns [`NotifyError::Transport`] if the request fails or times out and
    /// [`NotifyError::Provider`] on a non-2xx answer.
    #[instrument(skip_all)]
    pub async fn send_welcome(&self, email: &str) -> Result<(), NotifyError> {
        if !self.config.is_enabled() {
            info!("Email API key not configured, skipping welcome email");
            return Ok(());
        }

        let message = WelcomeEmail {
            from: &self.config.from,
            to: [email],
            subject: WELCOME_SUBJECT,
            html: WELCOME_HTML,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&message)
            .send()
            .await
            .map_err(NotifyError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        info!("Welcome email sent");

        Ok(())
    }

    /// Send the welcome email on a detached task that logs its own failure.
    ///
    /// The recipient is kept out of logs and exported spans.
    pub fn spawn_welcome(&self, email: String) -> JoinHandle<()> {
        let notifier = self.clone();
        let span = info_span!("notifier.welcome");

        tokio::spawn(
            async move {
                if let Err(err) = notifier.send_welcome(&email).await {
                    error!("Failed to send welcome email: {err}");
                }
            }
            .instrument(span),
        )
    }
}
