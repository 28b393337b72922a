//! Authentication form errors.

use thiserror::Error;

use spaza_core::EmailError;

/// A single failed sign-in or sign-up field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("First name is required")]
    FirstNameRequired,

    #[error("Last name is required")]
    LastNameRequired,

    /// Email missing or malformed.
    #[error(transparent)]
    InvalidEmail(#[from] EmailError),

    #[error("Password is required")]
    PasswordRequired,

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },
}

/// Every failed field of a sign-in or sign-up form, in form order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_messages(.0))]
pub struct CredentialErrors(pub Vec<AuthError>);

impl CredentialErrors {
    /// One message per failed field.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

fn join_messages(errors: &[AuthError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
