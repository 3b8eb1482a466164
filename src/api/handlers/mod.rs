pub mod health;
pub use self::health::{health, root};

pub mod signup;
pub use self::signup::signup;

pub mod login;
pub use self::login::login;

pub mod signups;
pub use self::signups::{count, delete, list};

// common functions for the handlers
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Longest email the `waitlist_signups.email` column accepts.
pub const MAX_EMAIL_LENGTH: usize = 255;

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Message {
    pub message: String,
}

pub fn valid_email(email: &str) -> bool {
    email.len() <= MAX_EMAIL_LENGTH
        && Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(valid_email("a@x.com"));
        assert!(valid_email("first.last+tag@sub.example.org"));
    }

    #[test]
    fn test_invalid_email() {
        assert!(!valid_email(""));
        assert!(!valid_email("a@x"));
        assert!(!valid_email("@x.com"));
        assert!(!valid_email("a@@x.com"));
        assert!(!valid_email("a b@x.com"));
        assert!(!valid_email("not-an-email"));
    }

    #[test]
    fn test_email_too_long() {
        let local = "a".repeat(MAX_EMAIL_LENGTH);
        assert!(!valid_email(&format!("{local}@x.com")));
    }
}
