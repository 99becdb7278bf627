//! Server-authoritative cart mirror.
//!
//! The server owns the cart; this module keeps a local mirror of items,
//! count, and summary, and mediates every mutation. Writes are
//! confirm-then-refresh: the mutation is acknowledged first, then cart and
//! count are refetched, so the mirror never diverges from the server for
//! more than one round trip. There is no optimistic intermediate state.
//!
//! Mutations are serialized behind an async lock so a double-clicked
//! increment cannot interleave two write+refetch sequences.

use std::sync::{Arc, PoisonError, RwLock};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::instrument;

use clovemart_core::VariantId;

use crate::error::ApiError;
use crate::gateway::RequestGateway;

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

/// A line in the cart. `variant_id` is the unit of cart identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CartItem {
    #[serde(rename = "product_variant_id")]
    pub variant_id: VariantId,
    pub product_name: String,
    pub variant_name: String,
    #[serde(rename = "price")]
    pub unit_price: Decimal,
    pub quantity: u32,
    pub available_stock: u32,
}

impl CartItem {
    /// Line total at the current unit price.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Totals derived and owned by the server; the client refetches rather than
/// recomputing them locally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub total_items: u32,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Result of asking the server whether all cart lines are still satisfiable.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockValidation {
    pub is_valid: bool,
    #[serde(default)]
    pub invalid_items: Vec<InvalidCartLine>,
}

/// A cart line the server can no longer fulfil at its requested quantity.
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidCartLine {
    #[serde(rename = "product_variant_id")]
    pub variant_id: VariantId,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub requested: u32,
    #[serde(default)]
    pub available: u32,
}

impl InvalidCartLine {
    /// Human-readable description for business-error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        let name = self
            .product_name
            .clone()
            .unwrap_or_else(|| format!("variant {}", self.variant_id));
        format!(
            "{name}: requested {}, only {} available",
            self.requested, self.available
        )
    }
}

#[derive(Debug, Deserialize)]
struct CartPayload {
    #[serde(default)]
    items: Vec<CartItem>,
    #[serde(default)]
    summary: CartSummary,
}

#[derive(Debug, Deserialize)]
struct CountPayload {
    #[serde(rename = "itemCount", default)]
    item_count: u32,
}

#[derive(Serialize)]
struct CartWriteForm {
    product_variant_id: VariantId,
    quantity: u32,
}

#[derive(Serialize)]
struct CartRemoveForm {
    product_variant_id: VariantId,
}

// ─────────────────────────────────────────────────────────────────────────────
// Synchronizer
// ─────────────────────────────────────────────────────────────────────────────

/// Local mirror of the server cart.
#[derive(Debug, Clone, Default)]
pub struct CartState {
    pub items: Vec<CartItem>,
    pub count: u32,
    pub summary: CartSummary,
}

/// Maintains the local cart mirror and mediates all mutations.
#[derive(Clone)]
pub struct CartSynchronizer {
    inner: Arc<CartInner>,
}

struct CartInner {
    gateway: RequestGateway,
    state: RwLock<CartState>,
    write_gate: Mutex<()>,
}

impl CartSynchronizer {
    /// Create a synchronizer with an empty mirror.
    #[must_use]
    pub(crate) fn new(gateway: RequestGateway) -> Self {
        Self {
            inner: Arc::new(CartInner {
                gateway,
                state: RwLock::new(CartState::default()),
                write_gate: Mutex::new(()),
            }),
        }
    }

    /// Snapshot of the full mirror.
    #[must_use]
    pub fn state(&self) -> CartState {
        self.read_state().clone()
    }

    /// Snapshot of the cart lines.
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.read_state().items.clone()
    }

    /// Last fetched item count.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.read_state().count
    }

    /// Last fetched server-computed summary.
    #[must_use]
    pub fn summary(&self) -> CartSummary {
        self.read_state().summary.clone()
    }

    /// Whether the mirrored cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_state().items.is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Pull authoritative items and summary. Safe to call anytime; on failure
    /// the prior mirror is left untouched and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails; the mirror is unchanged.
    #[instrument(skip(self))]
    pub async fn fetch_cart(&self) -> crate::error::Result<()> {
        let payload: CartPayload = self.inner.gateway.get("cart").await?;
        let mut state = self.write_state();
        state.items = payload.items;
        state.summary = payload.summary;
        Ok(())
    }

    /// Pull the authoritative item count.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails; the mirror is unchanged.
    #[instrument(skip(self))]
    pub async fn fetch_count(&self) -> crate::error::Result<()> {
        let payload: CountPayload = self.inner.gateway.get("cart/count").await?;
        self.write_state().count = payload.item_count;
        Ok(())
    }

    /// Ask the server whether all current cart lines are still satisfiable
    /// against live inventory. Used immediately before checkout.
    ///
    /// # Errors
    ///
    /// Returns an error if the validation request fails.
    #[instrument(skip(self))]
    pub async fn validate_stock(&self) -> crate::error::Result<StockValidation> {
        self.inner.gateway.post("cart/validate").await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes (confirm-then-refresh, serialized)
    // ─────────────────────────────────────────────────────────────────────────

    /// Add `quantity` of a variant to the cart.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` before any network call if the
    /// quantity is zero or would exceed the known available stock.
    #[instrument(skip(self))]
    pub async fn add_item(&self, variant_id: VariantId, quantity: u32) -> crate::error::Result<()> {
        self.guard_quantity(variant_id, quantity, true)?;

        let _gate = self.inner.write_gate.lock().await;
        self.inner
            .gateway
            .post_form_ack(
                "cart",
                &CartWriteForm {
                    product_variant_id: variant_id,
                    quantity,
                },
            )
            .await?;
        self.refresh_mirror().await
    }

    /// Set the quantity of an existing cart line.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` before any network call if the
    /// quantity is zero or exceeds the known available stock.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        variant_id: VariantId,
        quantity: u32,
    ) -> crate::error::Result<()> {
        self.guard_quantity(variant_id, quantity, false)?;

        let _gate = self.inner.write_gate.lock().await;
        self.inner
            .gateway
            .patch_form_ack(
                "cart/update",
                &CartWriteForm {
                    product_variant_id: variant_id,
                    quantity,
                },
            )
            .await?;
        self.refresh_mirror().await
    }

    /// Remove a line from the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or the follow-up refetch fails.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, variant_id: VariantId) -> crate::error::Result<()> {
        let _gate = self.inner.write_gate.lock().await;
        self.inner
            .gateway
            .delete_form_ack(
                "cart/remove",
                &CartRemoveForm {
                    product_variant_id: variant_id,
                },
            )
            .await?;
        self.refresh_mirror().await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or the follow-up refetch fails.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> crate::error::Result<()> {
        let _gate = self.inner.write_gate.lock().await;
        self.inner.gateway.delete_ack("cart").await?;
        self.refresh_mirror().await
    }

    /// Refetch cart and count after an acknowledged write. Sequenced inside
    /// the write gate so the refetch never races a concurrent mutation.
    async fn refresh_mirror(&self) -> crate::error::Result<()> {
        self.fetch_cart().await?;
        self.fetch_count().await
    }

    /// Local guard before any write: quantity bounds are checked against the
    /// mirrored line without touching the network.
    fn guard_quantity(
        &self,
        variant_id: VariantId,
        quantity: u32,
        adding: bool,
    ) -> crate::error::Result<()> {
        if quantity == 0 {
            return Err(ApiError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }

        let state = self.read_state();
        if let Some(item) = state.items.iter().find(|i| i.variant_id == variant_id) {
            let projected = if adding {
                item.quantity.saturating_add(quantity)
            } else {
                quantity
            };
            if projected > item.available_stock {
                return Err(ApiError::Validation(format!(
                    "only {} of {} in stock",
                    item.available_stock, item.product_name
                )));
            }
        }

        Ok(())
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, CartState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, CartState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn seed_mirror(&self, state: CartState) {
        *self.write_state() = state;
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use url::Url;

    use crate::session::{MemoryTokenStore, SessionManager};

    use super::*;

    /// A synchronizer whose gateway points at a closed port: any request
    /// that reaches the network fails with `ApiError::Http`, so these tests
    /// can distinguish "rejected locally" from "request issued".
    fn offline_synchronizer() -> CartSynchronizer {
        let base = Url::parse("http://127.0.0.1:9/customer/").expect("url");
        let http = reqwest::Client::new();
        let session = SessionManager::new(http.clone(), &base, Box::new(MemoryTokenStore::new()))
            .expect("session");
        CartSynchronizer::new(RequestGateway::new(http, base, session))
    }

    fn line(variant_id: i64, quantity: u32, available_stock: u32) -> CartItem {
        CartItem {
            variant_id: VariantId::new(variant_id),
            product_name: "Basmati Rice".to_string(),
            variant_name: "5kg".to_string(),
            unit_price: dec!(499),
            quantity,
            available_stock,
        }
    }

    #[tokio::test]
    async fn test_update_beyond_stock_never_hits_network() {
        let cart = offline_synchronizer();
        cart.seed_mirror(CartState {
            items: vec![line(1, 2, 4)],
            count: 2,
            summary: CartSummary::default(),
        });

        let err = cart
            .update_item(VariantId::new(1), 5)
            .await
            .expect_err("over-stock update must be rejected");
        assert!(matches!(err, ApiError::Validation(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_zero_quantity_rejected_locally() {
        let cart = offline_synchronizer();
        let err = cart
            .add_item(VariantId::new(1), 0)
            .await
            .expect_err("zero quantity must be rejected");
        assert!(matches!(err, ApiError::Validation(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_add_to_known_line_guards_combined_quantity() {
        let cart = offline_synchronizer();
        cart.seed_mirror(CartState {
            items: vec![line(1, 3, 4)],
            count: 3,
            summary: CartSummary::default(),
        });

        let err = cart
            .add_item(VariantId::new(1), 2)
            .await
            .expect_err("3 + 2 exceeds stock of 4");
        assert!(matches!(err, ApiError::Validation(_)), "got {err:?}");
    }

    #[test]
    fn test_cart_item_wire_shape() {
        let item: CartItem = serde_json::from_str(
            r#"{
                "product_variant_id": 11,
                "product_name": "Masala Chai",
                "variant_name": "250g",
                "price": 180.5,
                "quantity": 2,
                "available_stock": 9
            }"#,
        )
        .expect("parse cart item");
        assert_eq!(item.variant_id, VariantId::new(11));
        assert_eq!(item.line_total(), dec!(361));
    }

    #[test]
    fn test_summary_wire_shape() {
        let summary: CartSummary = serde_json::from_str(
            r#"{"totalItems": 3, "subtotal": 600, "tax": 30, "total": 630}"#,
        )
        .expect("parse summary");
        assert_eq!(summary.total_items, 3);
        assert_eq!(summary.total, dec!(630));
    }

    #[test]
    fn test_invalid_line_description() {
        let lines: StockValidation = serde_json::from_str(
            r#"{
                "isValid": false,
                "invalidItems": [{
                    "product_variant_id": 4,
                    "product_name": "Jaggery",
                    "requested": 5,
                    "available": 2
                }]
            }"#,
        )
        .expect("parse validation");
        assert!(!lines.is_valid);
        assert_eq!(
            lines.invalid_items[0].describe(),
            "Jaggery: requested 5, only 2 available"
        );
    }
}
