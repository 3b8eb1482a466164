use secrecy::SecretString;
use std::time::Duration;

pub const DEFAULT_SECRET_KEY: &str = "your-secret-key-change-this-in-production";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Process configuration, built once from CLI flags and environment.
#[derive(Clone)]
pub struct GlobalArgs {
    pub dsn: String,
    pub resend_api_key: SecretString,
    pub email_api_url: String,
    pub email_from: String,
    pub email_timeout: Duration,
    pub secret_key: SecretString,
    pub admin_password: SecretString,
    pub frontend_urls: Vec<String>,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(dsn: String) -> Self {
        Self {
            dsn,
            resend_api_key: SecretString::default(),
            email_api_url: crate::api::notifier::DEFAULT_API_URL.to_string(),
            email_from: crate::api::notifier::DEFAULT_FROM.to_string(),
            email_timeout: Duration::from_secs(crate::api::notifier::DEFAULT_TIMEOUT_SECONDS),
            secret_key: SecretString::from(DEFAULT_SECRET_KEY),
            admin_password: SecretString::from(DEFAULT_ADMIN_PASSWORD),
            frontend_urls: vec!["http://localhost:3000".to_string()],
        }
    }

    /// Names of the settings still holding their published defaults.
    #[must_use]
    pub fn unsafe_defaults(&self) -> Vec<&'static str> {
        use secrecy::ExposeSecret;

        let mut defaults = Vec::new();

        if self.secret_key.expose_secret() == DEFAULT_SECRET_KEY {
            defaults.push("secret-key");
        }

        if self.admin_password.expose_secret() == DEFAULT_ADMIN_PASSWORD {
            defaults.push("admin-password");
        }

        defaults
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("dsn", &redact_dsn(&self.dsn))
            .field("resend_api_key", &"***")
            .field("email_api_url", &self.email_api_url)
            .field("email_from", &self.email_from)
            .field("email_timeout", &self.email_timeout)
            .field("secret_key", &"***")
            .field("admin_password", &"***")
            .field("frontend_urls", &self.frontend_urls)
            .finish()
    }
}

fn redact_dsn(dsn: &str) -> String {
    match url::Url::parse(dsn) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        _ => dsn.to_string(),
    }
}
