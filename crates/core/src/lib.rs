//! Clovemart Core - Shared types library.
//!
//! This crate provides common types used across all Clovemart client
//! components:
//! - `client` - Customer-facing API client (session, cart, checkout)
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. This keeps
//! it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money helpers, and
//!   order/payment statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
