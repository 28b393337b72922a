//! Remote shop API.
//!
//! # Endpoints
//!
//! | Operation | Method | Path | Auth |
//! |---|---|---|---|
//! | Validate session | GET | `/auth/validate` | bearer |
//! | Fetch product | GET | `/product/{id}` | none |
//! | List products | GET | `/product/` | none |
//! | Fetch cart | GET | `/cart/` | bearer |
//! | Add to cart | POST | `/cart/add` | bearer |
//! | Remove from cart | DELETE | `/cart/delete/{cartItemId}` | bearer |
//! | Update quantity | PATCH | `/cart/update/{cartItemId}` | bearer |
//! | Create order | POST | `/order/create-checkout-session` | bearer |
//! | Sign up | POST | `/user/signup` | none |
//! | Sign in | POST | `/user/signin` | none |
//!
//! The services only see the [`StoreApi`] trait; [`HttpStoreApi`] is the
//! reqwest implementation and `MockStoreApi` is generated for tests.

mod client;
pub mod types;

pub use client::HttpStoreApi;
pub use types::{OrderDetails, OrderPayload, SignInRequest, SignInResponse, SignUpRequest};

use async_trait::async_trait;
use mockall::automock;
use secrecy::SecretString;
use thiserror::Error;

use spaza_core::{CartLineId, ProductId};

use crate::models::{CartLine, Product};

/// Errors that can occur when talking to the remote API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure (connection refused, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a status the operation does not accept.
    #[error("unexpected status {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Status {
        status: u16,
        /// The `message` field of the error body, if there was one.
        message: Option<String>,
    },

    /// The body could not be decoded.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// An endpoint URL could not be built.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// An ID that would be read as a relative path step.
    #[error("invalid path segment {0:?}")]
    PathSegment(String),
}

impl ApiError {
    /// Message supplied by the server, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref().filter(|m| !m.is_empty()),
            _ => None,
        }
    }

    /// Whether the server rejected the bearer token.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401, .. })
    }
}

/// Operations the storefront needs from the remote shop.
#[automock]
#[async_trait]
pub trait StoreApi: Send + Sync {
    /// Check that a stored token is still accepted.
    async fn validate_session(&self, token: &SecretString) -> Result<(), ApiError>;

    /// Fetch every product. A `null` body is an empty catalog.
    async fn products(&self) -> Result<Vec<Product>, ApiError>;

    /// Fetch a single product.
    async fn product(&self, id: &ProductId) -> Result<Product, ApiError>;

    /// Fetch the caller's cart lines in server order.
    async fn cart(&self, token: &SecretString) -> Result<Vec<CartLine>, ApiError>;

    /// Add `quantity` units of a product as a new cart line.
    async fn add_to_cart(
        &self,
        token: &SecretString,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), ApiError>;

    /// Delete a cart line.
    async fn remove_from_cart(&self, token: &SecretString, line_id: &CartLineId)
    -> Result<(), ApiError>;

    /// Set the quantity of a cart line.
    async fn update_quantity(
        &self,
        token: &SecretString,
        line_id: &CartLineId,
        quantity: u32,
    ) -> Result<(), ApiError>;

    /// Create an order from the cart contents.
    async fn create_order(
        &self,
        token: &SecretString,
        order: &OrderPayload,
    ) -> Result<OrderDetails, ApiError>;

    /// Register a new account.
    async fn sign_up(&self, request: &SignUpRequest) -> Result<(), ApiError>;

    /// Exchange credentials for a token.
    async fn sign_in(&self, request: &SignInRequest) -> Result<SignInResponse, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message() {
        let err = ApiError::Status {
            status: 400,
            message: Some("Out of stock".to_string()),
        };
        assert_eq!(err.server_message(), Some("Out of stock"));
        assert_eq!(err.to_string(), "unexpected status 400: Out of stock");

        let blank = ApiError::Status {
            status: 500,
            message: Some(String::new()),
        };
        assert_eq!(blank.server_message(), None);
    }

    #[test]
    fn test_is_unauthorized() {
        assert!(ApiError::Status { status: 401, message: None }.is_unauthorized());
        assert!(!ApiError::Status { status: 403, message: None }.is_unauthorized());
    }
}
