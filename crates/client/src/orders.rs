//! Order endpoint group: placement, history, tracking, cancellation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use clovemart_core::{AddressId, OrderId, OrderStatus, PaymentMode, VariantId};

use crate::catalog::{Page, PageInfo};
use crate::error::Result;
use crate::gateway::RequestGateway;

// ─────────────────────────────────────────────────────────────────────────────
// Order types
// ─────────────────────────────────────────────────────────────────────────────

/// A placed order as reported by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(rename = "delivery_status")]
    pub status: OrderStatus,
    pub payment_mode: PaymentMode,
    pub subtotal: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub delivery_charge: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    pub total: Decimal,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderItem {
    #[serde(rename = "product_variant_id")]
    pub variant_id: VariantId,
    pub product_name: String,
    #[serde(default)]
    pub variant_name: Option<String>,
    pub price: Decimal,
    pub quantity: u32,
}

/// Tracking detail for an order in transit.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderTracking {
    #[serde(rename = "delivery_status")]
    pub status: OrderStatus,
    #[serde(default)]
    pub expected_delivery: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updates: Vec<TrackingUpdate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingUpdate {
    pub status: OrderStatus,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Pricing breakdown submitted alongside a new order. The server re-derives
/// and verifies these figures before accepting the order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub delivery_charge: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

// Kept flat: the form codec only handles single-level key/value pairs.
#[derive(Debug, Serialize)]
struct OrderForm<'a> {
    address_id: AddressId,
    payment_mode: PaymentMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    coupon_code: Option<&'a str>,
    subtotal: Decimal,
    tax: Decimal,
    delivery_charge: Decimal,
    discount: Decimal,
    total: Decimal,
}

/// Filters for [`OrderApi::list`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrderQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
struct OrdersPage {
    #[serde(default)]
    orders: Vec<Order>,
    pagination: PageInfo,
}

#[derive(Debug, Deserialize)]
struct PlacedOrder {
    order: Order,
}

// ─────────────────────────────────────────────────────────────────────────────
// OrderApi
// ─────────────────────────────────────────────────────────────────────────────

/// Order endpoint group. All operations require an authenticated session.
#[derive(Clone)]
pub struct OrderApi {
    gateway: RequestGateway,
}

impl OrderApi {
    pub(crate) fn new(gateway: RequestGateway) -> Self {
        Self { gateway }
    }

    /// Place an order for the current cart contents.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Business` if the server rejects the order, for
    /// example when stock changed since validation or the totals disagree.
    #[instrument(skip(self, totals, coupon_code))]
    pub async fn create(
        &self,
        address_id: AddressId,
        payment_mode: PaymentMode,
        totals: &OrderTotals,
        coupon_code: Option<&str>,
    ) -> Result<Order> {
        let form = OrderForm {
            address_id,
            payment_mode,
            coupon_code,
            subtotal: totals.subtotal,
            tax: totals.tax,
            delivery_charge: totals.delivery_charge,
            discount: totals.discount,
            total: totals.total,
        };
        let placed: PlacedOrder = self.gateway.post_form("orders", &form).await?;
        Ok(placed.order)
    }

    /// Order history, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list(&self, query: &OrderQuery) -> Result<Page<Order>> {
        let page: OrdersPage = self.gateway.get_query("orders", query).await?;
        Ok(Page {
            items: page.orders,
            page_info: page.pagination,
        })
    }

    /// A single order by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is not found or belongs to another
    /// customer.
    #[instrument(skip(self))]
    pub async fn get(&self, id: OrderId) -> Result<Order> {
        self.gateway.get(&format!("orders/{id}")).await
    }

    /// Delivery tracking for an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is not found.
    #[instrument(skip(self))]
    pub async fn track(&self, id: OrderId) -> Result<OrderTracking> {
        self.gateway.get(&format!("orders/track/{id}")).await
    }

    /// Cancel an order. Only pending and processing orders can be cancelled;
    /// the server enforces the same rule.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Business` if the order is past the cancellable
    /// stage.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: OrderId) -> Result<()> {
        self.gateway.post_ack(&format!("orders/cancel/{id}")).await
    }
}
