//! Product catalog lookups.

use std::sync::Arc;

use tracing::instrument;

use spaza_core::{Price, ProductId};

use super::notices::Notifier;
use crate::api::StoreApi;
use crate::error::{Result, StorefrontError, ValidationError};
use crate::models::Product;

const LIST_FAILED: &str = "Could not load products";
const DETAIL_FAILED: &str = "Failed to load product details";

/// Read-only access to the remote catalog. Nothing is cached.
pub struct CatalogService {
    api: Arc<dyn StoreApi>,
    notifier: Notifier,
}

impl CatalogService {
    #[must_use]
    pub fn new(api: Arc<dyn StoreApi>, notifier: Notifier) -> Self {
        Self { api, notifier }
    }

    /// Every product in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Remote` if the catalog cannot be fetched.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        let result = self
            .api
            .products()
            .await
            .map_err(|e| StorefrontError::remote(e, LIST_FAILED));
        self.settle(result)
    }

    /// A single product.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for a blank ID or a product missing its ID,
    /// name or a positive price, and `StorefrontError::Remote` if the lookup fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: &ProductId) -> Result<Product> {
        let result = self.fetch_product(id).await;
        self.settle(result)
    }

    async fn fetch_product(&self, id: &ProductId) -> Result<Product> {
        if id.is_blank() {
            return Err(ValidationError::UndefinedProductId.into());
        }

        let product = self
            .api
            .product(id)
            .await
            .map_err(|e| StorefrontError::remote(e, DETAIL_FAILED))?;

        if product.id.is_blank() || product.name.trim().is_empty() || product.price <= Price::ZERO
        {
            return Err(ValidationError::InvalidProductData.into());
        }
        Ok(product)
    }

    fn settle<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.notifier.report(err);
        }
        result
    }
}
