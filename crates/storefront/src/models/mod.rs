//! Domain models for the storefront.

pub mod address;
pub mod cart;
pub mod session;

pub use address::{AddressErrors, AddressField, AddressForm, FieldError, FieldProblem, ShippingAddress};
pub use cart::{Cart, CartError, CartLine, Product};
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore, SessionStoreError};
