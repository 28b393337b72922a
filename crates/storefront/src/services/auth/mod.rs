//! Authentication service.
//!
//! Sign-up and sign-in against the remote API, with the form checks done
//! locally first. A successful sign-in persists the token in the session.

mod error;

pub use error::{AuthError, CredentialErrors};

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use spaza_core::Email;

use super::notices::Notifier;
use crate::api::{SignInRequest, SignUpRequest, StoreApi};
use crate::error::{Result, StorefrontError, ValidationError};
use crate::models::Session;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Sign-up form input.
#[derive(Debug, Clone)]
pub struct SignUpForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: SecretString,
}

/// Sign-in form input.
#[derive(Debug, Clone)]
pub struct SignInForm {
    pub email: String,
    pub password: SecretString,
}

impl SignUpForm {
    /// Check every field.
    ///
    /// # Errors
    ///
    /// Returns `CredentialErrors` listing each failed field in form order.
    pub fn validate(&self) -> std::result::Result<SignUpRequest, CredentialErrors> {
        let mut errors = Vec::new();
        if self.first_name.trim().is_empty() {
            errors.push(AuthError::FirstNameRequired);
        }
        if self.last_name.trim().is_empty() {
            errors.push(AuthError::LastNameRequired);
        }
        check_credentials(&self.email, &self.password, &mut errors);

        if !errors.is_empty() {
            return Err(CredentialErrors(errors));
        }
        Ok(SignUpRequest {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            password: self.password.expose_secret().to_string(),
        })
    }
}

impl SignInForm {
    /// Check every field.
    ///
    /// # Errors
    ///
    /// Returns `CredentialErrors` listing each failed field in form order.
    pub fn validate(&self) -> std::result::Result<SignInRequest, CredentialErrors> {
        let mut errors = Vec::new();
        check_credentials(&self.email, &self.password, &mut errors);

        if !errors.is_empty() {
            return Err(CredentialErrors(errors));
        }
        Ok(SignInRequest {
            email: self.email.clone(),
            password: self.password.expose_secret().to_string(),
        })
    }
}

/// Authentication service.
pub struct AuthService {
    api: Arc<dyn StoreApi>,
    session: Arc<Session>,
    notifier: Notifier,
}

impl AuthService {
    #[must_use]
    pub fn new(api: Arc<dyn StoreApi>, session: Arc<Session>, notifier: Notifier) -> Self {
        Self {
            api,
            session,
            notifier,
        }
    }

    /// Register a new account. The user still has to sign in afterwards.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Credentials` for bad input and
    /// `StorefrontError::Remote` if the server refuses.
    #[instrument(skip(self, form))]
    pub async fn sign_up(&self, form: &SignUpForm) -> Result<()> {
        let result = self.try_sign_up(form).await;
        self.settle(result)
    }

    /// Exchange credentials for a token and start an authenticated session.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Credentials` for bad input,
    /// `StorefrontError::Remote` if the server refuses or sends no token, and
    /// `StorefrontError::Session` if the token cannot be persisted.
    #[instrument(skip(self, form))]
    pub async fn sign_in(&self, form: &SignInForm) -> Result<()> {
        let result = self.try_sign_in(form).await;
        self.settle(result)
    }

    /// Forget the token.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Session` if the stored token cannot be
    /// removed. The in-memory session is cleared regardless.
    pub fn sign_out(&self) -> Result<()> {
        let result = self.session.end().map(|_| ()).map_err(StorefrontError::from);
        if result.is_ok() {
            self.notifier.success("Logged out successfully");
        }
        self.settle(result)
    }

    /// Ask the server whether the restored token is still valid.
    ///
    /// `Ok(false)` means there was no token to check. Raises no notices;
    /// the caller decides how to surface an expiry.
    pub(crate) async fn validate_stored_token(&self) -> Result<bool> {
        let Some(token) = self.session.token() else {
            return Ok(false);
        };
        match self.api.validate_session(&token).await {
            Ok(()) => {
                self.session.mark_authenticated();
                Ok(true)
            }
            Err(e) => {
                tracing::info!(error = %e, "Stored token rejected");
                Err(StorefrontError::SessionExpired)
            }
        }
    }

    async fn try_sign_up(&self, form: &SignUpForm) -> Result<()> {
        let request = form.validate().map_err(ValidationError::from)?;
        self.api
            .sign_up(&request)
            .await
            .map_err(|e| StorefrontError::remote(e, "Signup failed"))?;

        tracing::info!("Account created");
        self.notifier.success("Signup successful. Please log in.");
        Ok(())
    }

    async fn try_sign_in(&self, form: &SignInForm) -> Result<()> {
        let request = form.validate().map_err(ValidationError::from)?;
        let response = self.api.sign_in(&request).await.map_err(|e| {
            if e.is_unauthorized() {
                StorefrontError::Remote {
                    message: "Invalid email or password".to_string(),
                    source: Some(e),
                }
            } else {
                StorefrontError::remote(e, "Login failed")
            }
        })?;

        let token = response
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| StorefrontError::remote_message("Login failed"))?;
        self.session.begin(&token)?;

        tracing::info!("Signed in");
        self.notifier.success("Logged in successfully");
        Ok(())
    }

    fn settle<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.notifier.report(err);
        }
        result
    }
}

fn check_credentials(email: &str, password: &SecretString, errors: &mut Vec<AuthError>) {
    if let Err(e) = Email::parse(email) {
        errors.push(e.into());
    }

    let password = password.expose_secret();
    if password.is_empty() {
        errors.push(AuthError::PasswordRequired);
    } else if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(AuthError::WeakPassword {
            min: MIN_PASSWORD_LENGTH,
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::{ApiError, MockStoreApi, SignInResponse};
    use crate::models::{MemorySessionStore, SessionStore};
    use crate::services::notices::{self, Notice, NoticeReceiver};

    fn service(api: MockStoreApi) -> (AuthService, Arc<MemorySessionStore>, NoticeReceiver) {
        let store = Arc::new(MemorySessionStore::new());
        let session = Arc::new(Session::load(store.clone()).unwrap());
        let (notifier, notices) = notices::channel();
        (AuthService::new(Arc::new(api), session, notifier), store, notices)
    }

    fn sign_in_form(email: &str, password: &str) -> SignInForm {
        SignInForm {
            email: email.to_string(),
            password: SecretString::from(password),
        }
    }

    #[test]
    fn test_sign_up_reports_every_field() {
        let form = SignUpForm {
            first_name: "  ".to_string(),
            last_name: String::new(),
            email: "not-an-email".to_string(),
            password: SecretString::from("12345"),
        };
        assert_eq!(
            form.validate().unwrap_err().messages(),
            vec![
                "First name is required",
                "Last name is required",
                "Invalid email format",
                "Password must be at least 6 characters"
            ]
        );
    }

    #[test]
    fn test_sign_in_required_fields() {
        assert_eq!(
            sign_in_form("", "").validate().unwrap_err().messages(),
            vec!["Email address is required", "Password is required"]
        );
    }

    #[tokio::test]
    async fn test_invalid_form_makes_no_call() {
        let mut api = MockStoreApi::new();
        api.expect_sign_in().times(0);
        let (auth, _, mut notices) = service(api);

        auth.sign_in(&sign_in_form("user@example", "secret1")).await.unwrap_err();
        assert_eq!(notices.drain(), vec![Notice::error("Invalid email format")]);
    }

    #[tokio::test]
    async fn test_sign_in_persists_token() {
        let mut api = MockStoreApi::new();
        api.expect_sign_in()
            .withf(|r| r.email == "thandi@example.co.za" && r.password == "secret1")
            .times(1)
            .returning(|_| {
                Ok(SignInResponse {
                    token: Some("jwt-1".to_string()),
                })
            });
        let (auth, store, mut notices) = service(api);

        auth.sign_in(&sign_in_form("thandi@example.co.za", "secret1"))
            .await
            .unwrap();

        assert!(auth.session.is_authenticated());
        assert_eq!(store.get("token").unwrap().as_deref(), Some("jwt-1"));
        assert_eq!(notices.drain(), vec![Notice::success("Logged in successfully")]);
    }

    #[tokio::test]
    async fn test_sign_in_unauthorized() {
        let mut api = MockStoreApi::new();
        api.expect_sign_in().times(1).returning(|_| {
            Err(ApiError::Status {
                status: 401,
                message: Some("bad credentials".to_string()),
            })
        });
        let (auth, _, mut notices) = service(api);

        auth.sign_in(&sign_in_form("a@b.co", "secret1")).await.unwrap_err();
        assert!(!auth.session.is_authenticated());
        assert_eq!(notices.drain(), vec![Notice::error("Invalid email or password")]);
    }

    #[tokio::test]
    async fn test_sign_in_without_token_fails() {
        let mut api = MockStoreApi::new();
        api.expect_sign_in()
            .times(1)
            .returning(|_| Ok(SignInResponse { token: None }));
        let (auth, store, mut notices) = service(api);

        auth.sign_in(&sign_in_form("a@b.co", "secret1")).await.unwrap_err();
        assert_eq!(store.get("token").unwrap(), None);
        assert_eq!(notices.drain(), vec![Notice::error("Login failed")]);
    }

    #[tokio::test]
    async fn test_sign_up_failure_uses_server_message() {
        let mut api = MockStoreApi::new();
        api.expect_sign_up().times(1).returning(|_| {
            Err(ApiError::Status {
                status: 409,
                message: Some("Email already registered".to_string()),
            })
        });
        let (auth, _, mut notices) = service(api);

        let form = SignUpForm {
            first_name: "Thandi".to_string(),
            last_name: "Nkosi".to_string(),
            email: "thandi@example.co.za".to_string(),
            password: SecretString::from("secret1"),
        };
        auth.sign_up(&form).await.unwrap_err();
        assert_eq!(notices.drain(), vec![Notice::error("Email already registered")]);
    }

    #[tokio::test]
    async fn test_sign_out() {
        let (auth, store, mut notices) = service(MockStoreApi::new());
        auth.session.begin("jwt-1").unwrap();

        auth.sign_out().unwrap();

        assert!(auth.session.token().is_none());
        assert_eq!(store.get("token").unwrap(), None);
        assert_eq!(notices.drain(), vec![Notice::success("Logged out successfully")]);
    }
}
