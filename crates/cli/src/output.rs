//! Plain-text rendering of notices and storefront data.

use std::fmt::Write;

use spaza_storefront::models::{Cart, Product};
use spaza_storefront::services::{Confirmation, Notice, NoticeLevel};

#[allow(clippy::print_stdout)]
fn emit(text: &str) {
    print!("{text}");
}

pub fn notices(notices: &[Notice]) {
    emit(&format_notices(notices));
}

pub fn products(products: &[Product]) {
    emit(&format_products(products));
}

pub fn product(product: &Product) {
    emit(&format_product(product));
}

pub fn cart(cart: &Cart) {
    emit(&format_cart(cart));
}

pub fn confirmation(confirmation: &Confirmation) {
    emit(&format_confirmation(confirmation));
}

pub fn line(text: &str) {
    emit(&format!("{text}\n"));
}

fn format_notices(notices: &[Notice]) -> String {
    notices.iter().fold(String::new(), |mut out, notice| {
        let marker = match notice.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Error => "error",
        };
        let _ = writeln!(out, "[{marker}] {}", notice.message);
        out
    })
}

fn format_products(products: &[Product]) -> String {
    products.iter().fold(String::new(), |mut out, p| {
        let _ = writeln!(out, "{:<26} {:<30} {:>10}  {}", p.id, p.name, p.price, p.category);
        out
    })
}

fn format_product(product: &Product) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", product.name, product.id);
    let _ = writeln!(out, "Price:    {}", product.price);
    if !product.category.is_empty() {
        let _ = writeln!(out, "Category: {}", product.category);
    }
    if !product.image_url.is_empty() {
        let _ = writeln!(out, "Image:    {}", product.image_url);
    }
    if !product.description.is_empty() {
        let _ = writeln!(out, "\n{}", product.description);
    }
    out
}

fn format_cart(cart: &Cart) -> String {
    if cart.is_empty() {
        return "Your cart is empty.\n".to_string();
    }

    let mut out = String::new();
    for line in cart.lines() {
        let _ = writeln!(
            out,
            "{:<26} {:<30} {:>4} x {:>10} = {:>10}",
            line.id,
            line.product.name,
            line.quantity,
            line.product.price,
            line.line_total().map_or_else(|| "-".to_string(), |total| total.to_string())
        );
    }
    let _ = writeln!(out, "Items: {}  Subtotal: {}", cart.item_count(), cart.subtotal());
    out
}

fn format_confirmation(confirmation: &Confirmation) -> String {
    let mut out = String::new();
    match &confirmation.details.id {
        Some(id) => {
            let _ = writeln!(out, "Order {id} for {}", confirmation.total);
        }
        None => {
            let _ = writeln!(out, "Order placed for {}", confirmation.total);
        }
    }
    let _ = writeln!(out, "Payment: {}", confirmation.payment.label());
    if let Some(redirect) = &confirmation.redirect {
        let _ = writeln!(out, "Continue payment at: {}", redirect.to_url());
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use spaza_core::{CartLineId, Price, ProductId};
    use spaza_storefront::models::CartLine;

    use super::*;

    fn product(id: &str, name: &str, cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_string(),
            price: Price::from_cents(cents),
            image_url: String::new(),
            category: "Snacks".to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn test_notices_are_marked_by_level() {
        let text = format_notices(&[
            Notice::success("Item added to cart"),
            Notice::error("Cart is empty"),
        ]);
        assert_eq!(text, "[ok] Item added to cart\n[error] Cart is empty\n");
    }

    #[test]
    fn test_empty_cart() {
        assert_eq!(format_cart(&Cart::empty()), "Your cart is empty.\n");
    }

    #[test]
    fn test_cart_footer_shows_subtotal() {
        let cart = Cart::from_lines(vec![CartLine {
            id: CartLineId::new("l1"),
            product: product("p1", "Simba Chips", 1999),
            quantity: 2,
        }])
        .unwrap();
        let text = format_cart(&cart);
        assert!(text.contains("Simba Chips"));
        assert!(text.ends_with("Items: 2  Subtotal: R39.98\n"));
    }

    #[test]
    fn test_product_skips_empty_fields() {
        let text = format_product(&product("p1", "Simba Chips", 1999));
        assert_eq!(
            text,
            "Simba Chips (p1)\nPrice:    R19.99\nCategory: Snacks\n"
        );
    }
}
