//! Account and session commands.

use secrecy::SecretString;

use spaza_storefront::AppState;
use spaza_storefront::error::StorefrontError;
use spaza_storefront::services::{SignInForm, SignUpForm};

/// Register a new account.
pub async fn sign_up(
    state: &AppState,
    first_name: String,
    last_name: String,
    email: String,
    password: String,
) -> Result<(), StorefrontError> {
    let form = SignUpForm {
        first_name,
        last_name,
        email,
        password: SecretString::from(password),
    };
    state.sign_up(&form).await
}

/// Sign in and load the cart.
pub async fn sign_in(
    state: &AppState,
    email: String,
    password: String,
) -> Result<(), StorefrontError> {
    let form = SignInForm {
        email,
        password: SecretString::from(password),
    };
    let cart = state.sign_in(&form).await?;
    tracing::info!(items = cart.item_count(), "Session started");
    Ok(())
}

/// Sign out.
pub async fn sign_out(state: &AppState) -> Result<(), StorefrontError> {
    state.sign_out().await
}
