//! Cart Manager.
//!
//! The single writer of the local cart. Every mutation goes to the server
//! first and, on success, the whole cart is fetched again; the local copy is
//! never patched in place. A cart that cannot be fetched is treated as empty.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::RwLock;
use tracing::instrument;

use spaza_core::{CartLineId, Price};

use super::guard::InFlight;
use super::notices::Notifier;
use crate::api::StoreApi;
use crate::error::{
    LOG_IN_AGAIN, LOG_IN_TO_ADD, Operation, Result, StorefrontError, ValidationError,
    add_breadcrumb,
};
use crate::models::{Cart, Product, Session};

const LOAD_FAILED: &str = "Could not load cart items";
const ADD_FAILED: &str = "Failed to add item to cart";
const REMOVE_FAILED: &str = "Failed to remove item from cart";
const UPDATE_FAILED: &str = "Failed to update cart";

/// Owns the authenticated user's cart.
pub struct CartManager {
    api: Arc<dyn StoreApi>,
    session: Arc<Session>,
    notifier: Notifier,
    cart: RwLock<Cart>,
    adding: InFlight,
    removing: InFlight,
    updating: InFlight,
}

impl CartManager {
    #[must_use]
    pub fn new(api: Arc<dyn StoreApi>, session: Arc<Session>, notifier: Notifier) -> Self {
        Self {
            api,
            session,
            notifier,
            cart: RwLock::new(Cart::empty()),
            adding: InFlight::new(Operation::AddItem),
            removing: InFlight::new(Operation::RemoveItem),
            updating: InFlight::new(Operation::UpdateQuantity),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// A copy of the current cart.
    pub async fn snapshot(&self) -> Cart {
        self.cart.read().await.clone()
    }

    /// Σ quantity × unit price over the current lines.
    pub async fn subtotal(&self) -> Price {
        self.cart.read().await.subtotal()
    }

    /// Total units in the cart.
    pub async fn item_count(&self) -> u64 {
        self.cart.read().await.item_count()
    }

    /// Whether a request of this kind is outstanding, for disabling controls.
    #[must_use]
    pub fn is_busy(&self, operation: Operation) -> bool {
        match operation {
            Operation::AddItem => self.adding.is_busy(),
            Operation::RemoveItem => self.removing.is_busy(),
            Operation::UpdateQuantity => self.updating.is_busy(),
            Operation::SubmitOrder => false,
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Replace the local cart with the server's.
    ///
    /// Signed out, the cart is simply emptied. A failed fetch also empties
    /// the cart and raises a notice.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError` if the cart could not be fetched.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<Cart> {
        let result = self.refresh().await;
        self.settle(result).await
    }

    /// Add one unit of `product` as a new cart line.
    ///
    /// Rejected without a network call when signed out, when `product` is
    /// absent or has no ID, or when the product already has a line.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError` for any rejection or failed request.
    #[instrument(skip(self, product), fields(product_id = product.map(|p| p.id.as_str())))]
    pub async fn add_item(&self, product: Option<&Product>) -> Result<Cart> {
        let result = self.try_add_item(product).await;
        self.settle(result).await
    }

    /// Delete a cart line.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError` when signed out or if the request fails.
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub async fn remove_item(&self, line_id: &CartLineId) -> Result<Cart> {
        let result = self.try_remove_item(line_id).await;
        self.settle(result).await
    }

    /// Set a line's quantity. Zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError` when signed out, if `quantity` does not fit
    /// the wire format, or if the request fails.
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub async fn update_quantity(&self, line_id: &CartLineId, quantity: i64) -> Result<Cart> {
        if self.session.token().is_some() && quantity <= 0 {
            return self.remove_item(line_id).await;
        }
        let result = self.try_update_quantity(line_id, quantity).await;
        self.settle(result).await
    }

    /// Empty the local cart without touching the server.
    pub async fn reset(&self) {
        *self.cart.write().await = Cart::empty();
    }

    /// Drop the session after the server rejected its token.
    ///
    /// Returns `true` if a token was held, i.e. this is the first time the
    /// expiry was noticed.
    pub async fn expire_session(&self) -> bool {
        let had_token = match self.session.end() {
            Ok(had_token) => had_token,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to clear the stored token");
                true
            }
        };
        self.reset().await;
        had_token
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Fetch and install the server cart without raising notices.
    pub(crate) async fn refresh(&self) -> Result<Cart> {
        if !self.session.is_authenticated() {
            self.reset().await;
            return Ok(Cart::empty());
        }

        let lines = match self.token() {
            Ok(token) => self
                .api
                .cart(&token)
                .await
                .map_err(|e| StorefrontError::from_authorized(e, LOAD_FAILED)),
            Err(e) => Err(e),
        };

        let cart = lines.and_then(|lines| {
            Cart::from_lines(lines).map_err(|e| {
                tracing::error!(error = %e, "Server returned an unusable cart");
                StorefrontError::remote_message(LOAD_FAILED)
            })
        });

        match cart {
            Ok(cart) => {
                tracing::debug!(
                    lines = cart.lines().len(),
                    subtotal = %cart.subtotal(),
                    "Cart reloaded"
                );
                *self.cart.write().await = cart.clone();
                Ok(cart)
            }
            Err(e) => {
                self.reset().await;
                Err(e)
            }
        }
    }

    async fn try_add_item(&self, product: Option<&Product>) -> Result<Cart> {
        if !self.session.is_authenticated() {
            return Err(StorefrontError::AuthRequired {
                hint: LOG_IN_TO_ADD,
            });
        }
        let token = self.token()?;
        let product = product.ok_or(ValidationError::MissingProduct)?;
        if product.id.is_blank() {
            return Err(ValidationError::MissingProductId.into());
        }
        if self.cart.read().await.contains_product(&product.id) {
            return Err(ValidationError::DuplicateCartEntry(product.id.clone()).into());
        }

        let _guard = self.adding.try_begin()?;
        self.api
            .add_to_cart(&token, &product.id, 1)
            .await
            .map_err(|e| StorefrontError::from_authorized(e, ADD_FAILED))?;

        add_breadcrumb("cart", "Added item", Some(&[("product_id", product.id.as_str())]));
        self.notifier.success("Item added to cart");
        self.refresh().await
    }

    async fn try_remove_item(&self, line_id: &CartLineId) -> Result<Cart> {
        let token = self.token()?;

        let _guard = self.removing.try_begin()?;
        self.api
            .remove_from_cart(&token, line_id)
            .await
            .map_err(|e| StorefrontError::from_authorized(e, REMOVE_FAILED))?;

        add_breadcrumb("cart", "Removed item", Some(&[("line_id", line_id.as_str())]));
        self.notifier.success("Item removed from cart");
        self.refresh().await
    }

    async fn try_update_quantity(&self, line_id: &CartLineId, quantity: i64) -> Result<Cart> {
        let token = self.token()?;
        let quantity =
            u32::try_from(quantity).map_err(|_| ValidationError::QuantityOutOfRange(quantity))?;

        let _guard = self.updating.try_begin()?;
        self.api
            .update_quantity(&token, line_id, quantity)
            .await
            .map_err(|e| StorefrontError::from_authorized(e, UPDATE_FAILED))?;

        let quantity = quantity.to_string();
        add_breadcrumb(
            "cart",
            "Updated quantity",
            Some(&[("line_id", line_id.as_str()), ("quantity", quantity.as_str())]),
        );
        self.notifier.success("Cart updated");
        self.refresh().await
    }

    fn token(&self) -> Result<SecretString> {
        self.session
            .token()
            .ok_or(StorefrontError::AuthRequired { hint: LOG_IN_AGAIN })
    }

    /// Operation boundary: expire the session on a rejected token, then
    /// surface the error as a notice.
    async fn settle<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if matches!(err, StorefrontError::SessionExpired) {
                self.expire_session().await;
            }
            self.notifier.report(err);
        }
        result
    }
}
