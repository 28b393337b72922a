//! Catalog and cart commands.

use spaza_core::{CartLineId, ProductId};
use spaza_storefront::AppState;
use spaza_storefront::error::StorefrontError;

use crate::output;

pub async fn products(state: &AppState) -> Result<(), StorefrontError> {
    let products = state.catalog().list_products().await?;
    output::products(&products);
    Ok(())
}

pub async fn product(state: &AppState, id: &ProductId) -> Result<(), StorefrontError> {
    let product = state.catalog().product(id).await?;
    output::product(&product);
    Ok(())
}

/// Show the cart as loaded when the session was restored.
pub async fn cart(state: &AppState) {
    output::cart(&state.cart().snapshot().await);
}

/// Look the product up, then add one unit of it.
pub async fn add(state: &AppState, product_id: &ProductId) -> Result<(), StorefrontError> {
    // Without a session the cart refuses before the product matters.
    let product = if state.session().is_authenticated() {
        Some(state.catalog().product(product_id).await?)
    } else {
        None
    };
    let cart = state.cart().add_item(product.as_ref()).await?;
    output::cart(&cart);
    Ok(())
}

pub async fn remove(state: &AppState, line_id: &CartLineId) -> Result<(), StorefrontError> {
    let cart = state.cart().remove_item(line_id).await?;
    output::cart(&cart);
    Ok(())
}

pub async fn update(
    state: &AppState,
    line_id: &CartLineId,
    quantity: i64,
) -> Result<(), StorefrontError> {
    let cart = state.cart().update_quantity(line_id, quantity).await?;
    output::cart(&cart);
    Ok(())
}
