//! Clovemart customer API client.
//!
//! This crate wraps the Clovemart customer HTTP API in typed service
//! objects: token-backed sessions with transparent refresh, a server-mirrored
//! cart, local pricing, and a checkout state machine.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod addresses;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
mod client;
pub mod config;
pub mod error;
mod gateway;
pub mod orders;
pub mod pricing;
pub mod session;

pub use client::CustomerClient;
pub use error::{ApiError, Result};
