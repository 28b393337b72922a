//! Command implementations.
//!
//! Each command delegates to the storefront services; failures have already
//! been raised as notices by the time an error is returned here.

pub mod account;
pub mod checkout;
pub mod shop;
