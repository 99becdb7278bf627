//! Shared type definitions.
//!
//! All types here are plain data: serde-friendly, no I/O.

mod id;
mod money;
mod status;

pub use id::{
    AddressId, CategoryId, CustomerId, OrderId, ProductId, SubcategoryId, VariantId,
};
pub use money::format_amount;
pub use status::{OrderStatus, PaymentMode};
