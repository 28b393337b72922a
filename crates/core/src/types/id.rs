//! Newtype IDs for type-safe entity references.
//!
//! The remote API hands out opaque string identifiers. Use the `define_id!`
//! macro to wrap them so a cart-line ID can never be passed where a product
//! ID is expected.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Default`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_str()`, `is_blank()`
/// - `From<String>`, `From<&str>` and `Into<String>` implementations
///
/// # Example
///
/// ```rust
/// # use spaza_core::define_id;
/// define_id!(ProductId);
/// define_id!(CartLineId);
///
/// let product_id = ProductId::new("p-1");
/// let line_id = CartLineId::new("p-1");
///
/// // These are different types, so this won't compile:
/// // let _: ProductId = line_id;
/// assert_eq!(product_id.as_str(), line_id.as_str());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            Default,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the ID is empty or only whitespace.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Catalog product identifier.
define_id!(ProductId);
// Server-assigned identifier of a cart entry (distinct from the product it holds).
define_id!(CartLineId);
// Server-assigned identifier of a created order.
define_id!(OrderId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_is_transparent() {
        let id = ProductId::new("abc-123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc-123\"");

        let parsed: CartLineId = serde_json::from_str("\"line-9\"").unwrap();
        assert_eq!(parsed.as_str(), "line-9");
    }

    #[test]
    fn test_is_blank() {
        assert!(ProductId::new("").is_blank());
        assert!(ProductId::new("   ").is_blank());
        assert!(!ProductId::new("p1").is_blank());
    }

    #[test]
    fn test_display() {
        assert_eq!(CartLineId::from("line-1").to_string(), "line-1");
    }
}
