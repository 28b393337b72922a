//! Email address type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Email`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// The input string is empty.
    #[error("Email address is required")]
    Empty,
    /// The input is not of the form `local@domain.tld`.
    #[error("Invalid email format")]
    InvalidFormat,
}

/// An email address.
///
/// Validation mirrors what the shop's sign-in form accepts: some
/// non-whitespace text, an `@`, more non-whitespace text, a `.`, and at least
/// one further non-whitespace character. It is deliberately loose; the
/// server has the final say.
///
/// ## Examples
///
/// ```
/// use spaza_core::Email;
///
/// assert!(Email::parse("user@example.com").is_ok());
/// assert!(Email::parse("user.name+tag@domain.co.za").is_ok());
///
/// assert!(Email::parse("").is_err());
/// assert!(Email::parse("no-at-symbol").is_err());
/// assert!(Email::parse("user@localhost").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Parse an `Email` from a string.
    ///
    /// # Errors
    ///
    /// Returns [`EmailError::Empty`] for an empty input and
    /// [`EmailError::InvalidFormat`] when no `x@y.z` shaped run of
    /// non-whitespace characters can be found.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        if s.is_empty() {
            return Err(EmailError::Empty);
        }

        if s.split_whitespace().any(looks_like_address) {
            Ok(Self(s.to_owned()))
        } else {
            Err(EmailError::InvalidFormat)
        }
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Email` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// `\S+@\S+\.\S+` on a single whitespace-free token.
fn looks_like_address(token: &str) -> bool {
    token.char_indices().any(|(at, c)| {
        if c != '@' || at == 0 {
            return false;
        }
        let domain = &token[at + 1..];
        domain
            .char_indices()
            .any(|(dot, d)| d == '.' && dot > 0 && dot + 1 < domain.len())
    })
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_emails() {
        assert!(Email::parse("user@example.com").is_ok());
        assert!(Email::parse("user.name@example.com").is_ok());
        assert!(Email::parse("user+tag@example.com").is_ok());
        assert!(Email::parse("user@subdomain.example.com").is_ok());
        assert!(Email::parse("a@b.c").is_ok());
        assert!(Email::parse("a@@b.c").is_ok());
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(Email::parse(""), Err(EmailError::Empty));
    }

    #[test]
    fn test_parse_invalid() {
        for input in ["no-at-symbol", "@domain.com", "user@", "user@domain", "user@.com", "user@domain.", "a @b.c"] {
            assert_eq!(
                Email::parse(input),
                Err(EmailError::InvalidFormat),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(EmailError::Empty.to_string(), "Email address is required");
        assert_eq!(EmailError::InvalidFormat.to_string(), "Invalid email format");
    }

    #[test]
    fn test_serde_roundtrip() {
        let email = Email::parse("user@example.com").unwrap();
        let json = serde_json::to_string(&email).unwrap();
        assert_eq!(json, "\"user@example.com\"");

        let parsed: Email = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, email);
    }

    #[test]
    fn test_from_str() {
        let email: Email = "user@example.com".parse().unwrap();
        assert_eq!(email.as_str(), "user@example.com");
    }
}
