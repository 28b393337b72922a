//! Spaza storefront client library.
//!
//! The client side of a small online shop: browsing products, a per-user
//! cart kept in sync with the shop API, checkout with a simulated payment
//! gateway, and invoice generation.
//!
//! Everything hangs off [`state::AppState`]. Operations report progress and
//! failures as [`services::Notice`]s on the channel handed to the state, and
//! also return a typed [`error::StorefrontError`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod state;

pub use state::{AppState, StateError};
