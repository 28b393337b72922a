//! Spaza Core - Shared types library.
//!
//! This crate provides common types used across all Spaza components:
//! - `storefront` - Cart, checkout and invoice client for the shop's REST API
//! - `cli` - Command-line storefront
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and payment methods

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
