//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Sign-up, sign-in and sign-out
//! - `catalog` - Product listing and lookup
//! - `cart` - The Cart Manager, sole writer of the local cart
//! - `checkout` - Order submission and invoicing
//! - `invoice` - Invoice assembly and rendering
//! - `payment` - Simulated payment gateway redirect
//! - `notices` - User-visible notices raised at operation boundaries

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
mod guard;
pub mod invoice;
pub mod notices;
pub mod payment;

pub use auth::{AuthService, SignInForm, SignUpForm};
pub use cart::CartManager;
pub use catalog::CatalogService;
pub use checkout::{CheckoutService, CheckoutState, Confirmation, DraftOrder};
pub use invoice::{Invoice, InvoiceRenderer, RenderedInvoice, TextInvoiceRenderer};
pub use notices::{Notice, NoticeLevel, NoticeReceiver, Notifier};
pub use payment::{PaymentGateway, PaymentRedirect};
