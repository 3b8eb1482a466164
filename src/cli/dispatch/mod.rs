use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::time::Duration;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if a required argument is missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8000);

    let string = |name: &str| -> Result<String> {
        matches
            .get_one::<String>(name)
            .cloned()
            .with_context(|| format!("missing required argument: --{name}"))
    };

    let mut globals = GlobalArgs::new(string("dsn")?);

    globals.resend_api_key = SecretString::from(string("resend-api-key")?);
    globals.email_api_url = string("email-api-url")?;
    globals.email_from = string("email-from")?;
    globals.email_timeout = Duration::from_secs(
        matches
            .get_one::<u64>("email-timeout")
            .copied()
            .unwrap_or(10),
    );
    globals.secret_key = SecretString::from(string("secret-key")?);
    globals.admin_password = SecretString::from(string("admin-password")?);
    globals.frontend_urls = matches
        .get_many::<String>("frontend-url")
        .map(|urls| {
            urls.map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(Action::Server { port, globals })
}
