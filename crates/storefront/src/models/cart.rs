//! Catalog and cart domain types.
//!
//! These double as the wire format of the remote API, which speaks
//! camelCase JSON.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use spaza_core::{CartLineId, Price, ProductId};

/// A product served by the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Catalog ID. Some endpoints spell it `productId`; a missing ID
    /// deserializes as blank and is rejected before any cart call.
    #[serde(default, alias = "productId")]
    pub id: ProductId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Unit price.
    pub price: Price,
    /// Product image URL.
    #[serde(default, rename = "imageURL")]
    pub image_url: String,
    /// Category label.
    #[serde(default)]
    pub category: String,
    /// Long description.
    #[serde(default)]
    pub description: String,
}

/// One server-tracked cart entry.
///
/// `id` identifies the entry, not the product it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Cart line ID.
    pub id: CartLineId,
    /// The product in this line.
    pub product: Product,
    /// Quantity (always positive).
    pub quantity: u32,
}

impl CartLine {
    /// `quantity × unit price`, or `None` if it does not fit.
    ///
    /// Always `Some` for the lines of a [`Cart`].
    #[must_use]
    pub fn line_total(&self) -> Option<Price> {
        self.product.price.checked_times(self.quantity)
    }
}

/// Server lines that cannot form a cart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("cart line {0} has a negative price")]
    NegativePrice(CartLineId),

    #[error("cart total is out of range")]
    Overflow,
}

/// Local projection of the server-side cart.
///
/// The subtotal is derived once on construction, and a `Cart` is never
/// mutated in place afterwards, so `subtotal == Σ quantity × price` always
/// holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
    subtotal: Price,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a cart from the server's lines, in server order.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if a price is negative or a total does not fit.
    pub fn from_lines(lines: Vec<CartLine>) -> Result<Self, CartError> {
        let mut subtotal = Price::ZERO;
        for line in &lines {
            if line.product.price.is_negative() {
                return Err(CartError::NegativePrice(line.id.clone()));
            }
            subtotal = line
                .line_total()
                .and_then(|total| subtotal.checked_add(total))
                .ok_or(CartError::Overflow)?;
        }
        Ok(Self { lines, subtotal })
    }

    /// Lines in server order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Σ quantity × unit price over all lines.
    #[must_use]
    pub const fn subtotal(&self) -> Price {
        self.subtotal
    }

    /// Total number of units (the navbar badge).
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether a line already holds `product_id`.
    #[must_use]
    pub fn contains_product(&self, product_id: &ProductId) -> bool {
        self.lines.iter().any(|l| &l.product.id == product_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn product(id: &str, cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Price::from_cents(cents),
            image_url: String::new(),
            category: "General".to_string(),
            description: String::new(),
        }
    }

    pub(crate) fn line(id: &str, product_id: &str, cents: i64, quantity: u32) -> CartLine {
        CartLine {
            id: CartLineId::new(id),
            product: product(product_id, cents),
            quantity,
        }
    }

    #[test]
    fn test_subtotal_is_sum_of_line_totals() {
        let cart =
            Cart::from_lines(vec![line("l1", "p1", 5000, 2), line("l2", "p2", 1999, 1)]).unwrap();
        assert_eq!(cart.subtotal(), Price::from_cents(11999));
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::empty();
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal(), Price::ZERO);
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn test_contains_product_compares_product_not_line() {
        let cart = Cart::from_lines(vec![line("l1", "p1", 100, 1)]).unwrap();
        assert!(cart.contains_product(&ProductId::new("p1")));
        assert!(!cart.contains_product(&ProductId::new("l1")));
    }

    #[test]
    fn test_overflowing_lines_are_rejected() {
        let json = r#"[{
            "id": "l1",
            "quantity": 1000000000,
            "product": {"id": "p1", "name": "Gold", "price": 1e20}
        }]"#;
        let lines: Vec<CartLine> = serde_json::from_str(json).unwrap();
        assert_eq!(lines.first().and_then(CartLine::line_total), None);
        assert_eq!(Cart::from_lines(lines), Err(CartError::Overflow));
    }

    #[test]
    fn test_negative_price_is_rejected() {
        let lines = vec![line("l1", "p1", 100, 1), line("l2", "p2", -50, 1)];
        assert_eq!(
            Cart::from_lines(lines),
            Err(CartError::NegativePrice(CartLineId::new("l2")))
        );
    }

    #[test]
    fn test_deserialize_server_payload() {
        let json = r#"{
            "id": "line-1",
            "quantity": 2,
            "product": {
                "id": "p-1",
                "name": "Rooibos Tea",
                "price": 49.5,
                "imageURL": "https://cdn.example.com/tea.png",
                "category": "Drinks",
                "description": "Loose leaf"
            }
        }"#;
        let line: CartLine = serde_json::from_str(json).unwrap();
        assert_eq!(line.product.image_url, "https://cdn.example.com/tea.png");
        assert_eq!(line.line_total(), Some(Price::from_cents(9900)));
    }

    #[test]
    fn test_product_id_alias_and_missing_id() {
        let aliased: Product =
            serde_json::from_str(r#"{"productId": "p-9", "name": "Mug", "price": 10}"#).unwrap();
        assert_eq!(aliased.id.as_str(), "p-9");

        let missing: Product = serde_json::from_str(r#"{"name": "Mug", "price": 10}"#).unwrap();
        assert!(missing.id.is_blank());
    }
}
