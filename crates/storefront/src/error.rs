//! Unified error handling with Sentry integration.
//!
//! Every storefront operation returns `Result<T, StorefrontError>`. The
//! services also turn each error into a user-visible notice at the operation
//! boundary (see [`crate::services::notices`]); remote failures are captured
//! to Sentry there.

use thiserror::Error;

use spaza_core::ProductId;

use crate::api::ApiError;
use crate::models::{AddressErrors, SessionStoreError};
use crate::services::auth::CredentialErrors;
use crate::services::invoice::InvoiceError;

/// Shown when an operation needs a token and none is held.
pub const LOG_IN_AGAIN: &str = "Please log in again.";

/// Shown when adding to the cart while signed out.
pub const LOG_IN_TO_ADD: &str = "Please log in to add items to your cart.";

/// Storefront error taxonomy.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// No token is held; nothing was sent to the server.
    #[error("{hint}")]
    AuthRequired { hint: &'static str },

    /// The server rejected a previously valid token.
    #[error("Session expired. Please log in again.")]
    SessionExpired,

    /// Locally detected bad input; nothing was sent to the server.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Network failure or a status the operation does not accept.
    ///
    /// `message` is the server's message when it sent one, otherwise the
    /// operation's fallback text.
    #[error("{message}")]
    Remote {
        message: String,
        #[source]
        source: Option<ApiError>,
    },

    /// The operation is not allowed in the current state.
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// An identical operation is still outstanding; this one was dropped.
    #[error("{0} is already in progress")]
    InFlight(Operation),

    /// The durable session store failed.
    #[error("Could not access the saved session: {0}")]
    Session(#[from] SessionStoreError),

    /// The invoice document could not be produced.
    #[error(transparent)]
    Render(#[from] InvoiceError),
}

impl StorefrontError {
    /// Wrap a remote failure, preferring the server's message over `fallback`.
    #[must_use]
    pub fn remote(source: ApiError, fallback: &str) -> Self {
        let message = source.server_message().unwrap_or(fallback).to_string();
        Self::Remote {
            message,
            source: Some(source),
        }
    }

    /// Like [`Self::remote`], but a rejected token means the session expired.
    #[must_use]
    pub fn from_authorized(source: ApiError, fallback: &str) -> Self {
        if source.is_unauthorized() {
            Self::SessionExpired
        } else {
            Self::remote(source, fallback)
        }
    }

    /// A failure the server did not describe.
    #[must_use]
    pub fn remote_message(message: &str) -> Self {
        Self::Remote {
            message: message.to_string(),
            source: None,
        }
    }

    /// Text shown to the user, one entry per notice.
    ///
    /// Multi-field form errors yield one message per failed field.
    #[must_use]
    pub fn user_messages(&self) -> Vec<String> {
        match self {
            Self::Validation(ValidationError::Address(errors)) => errors.messages(),
            Self::Validation(ValidationError::Credentials(errors)) => errors.messages(),
            other => vec![other.to_string()],
        }
    }

    /// Whether this error should be reported to Sentry.
    #[must_use]
    pub const fn is_server_side(&self) -> bool {
        matches!(self, Self::Remote { .. } | Self::Session(_) | Self::Render(_))
    }
}

/// Input rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Address(#[from] AddressErrors),

    #[error(transparent)]
    Credentials(#[from] CredentialErrors),

    #[error("Cart is empty")]
    EmptyCart,

    /// The product already has a cart line.
    #[error("Item already in cart!")]
    DuplicateCartEntry(ProductId),

    #[error("Product is undefined.")]
    MissingProduct,

    #[error("Product ID is missing.")]
    MissingProductId,

    /// A catalog lookup was asked for a blank ID.
    #[error("Product ID is undefined")]
    UndefinedProductId,

    /// The catalog returned a product without an ID, a name or a positive
    /// price.
    #[error("Invalid product data")]
    InvalidProductData,

    #[error("Quantity {0} is too large")]
    QuantityOutOfRange(i64),
}

/// Operation refused because of the checkout state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PreconditionError {
    /// Invoice asked for before an order was confirmed.
    #[error("Invalid order data for invoice generation")]
    NoConfirmedOrder,

    /// Invoice asked for with an address field left empty.
    #[error("Invalid order data for invoice generation")]
    IncompleteAddress,

    /// Invoice asked for with nothing in the cart.
    #[error("Invalid order data for invoice generation")]
    EmptyCart,

    /// A line total does not fit in a price.
    #[error("Invalid order data for invoice generation")]
    LineTotalOutOfRange,

    /// A second order submitted while one awaits its invoice.
    #[error("An order is already awaiting its invoice")]
    OrderAlreadyConfirmed,
}

/// Mutating operations guarded against overlapping requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AddItem,
    RemoveItem,
    UpdateQuantity,
    SubmitOrder,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::AddItem => "Adding to cart",
            Self::RemoveItem => "Removing from cart",
            Self::UpdateQuantity => "Updating the cart",
            Self::SubmitOrder => "Order submission",
        })
    }
}

/// Result type alias for `StorefrontError`.
pub type Result<T> = std::result::Result<T, StorefrontError>;

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
