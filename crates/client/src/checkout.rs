//! Checkout flow: a linear state machine from address selection to a
//! confirmed order.
//!
//! The orchestrator owns no server state. It sequences reads and a single
//! atomic order-create call; the cart mirror stays canonical throughout, and
//! pricing is recomputed from that mirror at submission time rather than
//! carried forward from an earlier screen.

use chrono::Utc;
use tracing::{instrument, warn};

use clovemart_core::{AddressId, PaymentMode};

use crate::addresses::{Address, AddressApi};
use crate::cart::CartSynchronizer;
use crate::catalog::CatalogApi;
use crate::error::{ApiError, Result};
use crate::orders::{Order, OrderApi, OrderTotals};
use crate::pricing::{Coupon, PricingEngine, Quote};

// ─────────────────────────────────────────────────────────────────────────────
// States
// ─────────────────────────────────────────────────────────────────────────────

/// Where a checkout currently stands.
#[derive(Debug, Clone)]
pub enum CheckoutState {
    /// No delivery address chosen yet.
    AddressRequired,
    /// Cart lines are being checked against live inventory.
    StockValidating,
    /// Stock confirmed; the order can be submitted.
    ReadyToSubmit,
    /// The order-create request is in flight.
    Submitting,
    /// The order was accepted and the cart cleared.
    Confirmed { order: Order },
    /// Stock validation or submission failed. The cart is untouched; start a
    /// new checkout to retry.
    Failed { reason: String },
}

impl CheckoutState {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed { .. } | Self::Failed { .. })
    }
}

/// Outcome of opening a checkout. Missing prerequisites redirect the caller
/// instead of erroring in place.
pub enum CheckoutStart {
    Ready(Box<CheckoutOrchestrator>),
    /// No authenticated session; send the customer to login.
    NeedsLogin,
    /// Nothing in the cart; send the customer back to it.
    EmptyCart,
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// Drives one checkout attempt to completion.
///
/// Constructed via `CustomerClient::begin_checkout`. The only supported
/// payment mode is cash on delivery.
pub struct CheckoutOrchestrator {
    cart: CartSynchronizer,
    addresses: AddressApi,
    catalog: CatalogApi,
    orders: OrderApi,
    pricing: PricingEngine,
    state: CheckoutState,
    address: Option<Address>,
    coupon: Option<Coupon>,
}

impl CheckoutOrchestrator {
    pub(crate) fn new(
        cart: CartSynchronizer,
        addresses: AddressApi,
        catalog: CatalogApi,
        orders: OrderApi,
        pricing: PricingEngine,
    ) -> Self {
        Self {
            cart,
            addresses,
            catalog,
            orders,
            pricing,
            state: CheckoutState::AddressRequired,
            address: None,
            coupon: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &CheckoutState {
        &self.state
    }

    #[must_use]
    pub fn selected_address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    #[must_use]
    pub fn applied_coupon(&self) -> Option<&Coupon> {
        self.coupon.as_ref()
    }

    /// Choose the delivery address. The address is fetched so a stale or
    /// foreign ID fails here rather than at submission.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` if the checkout is already terminal,
    /// or a lookup error if the address does not exist.
    #[instrument(skip(self))]
    pub async fn select_address(&mut self, id: AddressId) -> Result<&Address> {
        if self.state.is_terminal() {
            return Err(ApiError::Validation(
                "checkout already finished".to_string(),
            ));
        }

        let address = self.addresses.get(id).await?;
        Ok(self.address.insert(address))
    }

    /// Check every cart line against live inventory. Closes the window
    /// between cart viewing and order submission.
    ///
    /// On success the checkout moves to `ReadyToSubmit`; if any line can no
    /// longer be satisfied it moves to `Failed` and the offending lines are
    /// listed in the returned `Business` error.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` if no address is selected, or
    /// `ApiError::Business` listing unsatisfiable lines.
    #[instrument(skip(self))]
    pub async fn revalidate(&mut self) -> Result<()> {
        if self.address.is_none() {
            return Err(ApiError::Validation(
                "select a delivery address first".to_string(),
            ));
        }
        if self.state.is_terminal() {
            return Err(ApiError::Validation(
                "checkout already finished".to_string(),
            ));
        }

        self.state = CheckoutState::StockValidating;
        let validation = self.cart.validate_stock().await?;

        if validation.is_valid {
            self.state = CheckoutState::ReadyToSubmit;
            Ok(())
        } else {
            let lines: Vec<String> = validation
                .invalid_items
                .iter()
                .map(crate::cart::InvalidCartLine::describe)
                .collect();
            let reason = format!("items no longer available: {}", lines.join("; "));
            self.state = CheckoutState::Failed {
                reason: reason.clone(),
            };
            Err(ApiError::Business(reason))
        }
    }

    /// Look up a coupon by code and hold it for the quote.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Business` if the code is unknown or the coupon is
    /// not currently acceptable (not yet active, expired, or exhausted).
    #[instrument(skip(self))]
    pub async fn apply_coupon(&mut self, code: &str) -> Result<()> {
        let coupon = self.catalog.coupon_by_code(code).await?;
        coupon
            .validate(Utc::now())
            .map_err(|rejection| ApiError::Business(rejection.to_string()))?;
        self.coupon = Some(coupon);
        Ok(())
    }

    /// Drop any applied coupon.
    pub fn clear_coupon(&mut self) {
        self.coupon = None;
    }

    /// Price the order as it stands, from the canonical cart summary.
    #[must_use]
    pub fn quote(&self) -> Quote {
        self.pricing
            .quote(&self.cart.summary(), self.coupon.as_ref(), Utc::now())
    }

    /// Submit the order. Only valid from `ReadyToSubmit`.
    ///
    /// Delivery charge and discount are recomputed from the cart summary here,
    /// not carried over from whatever was shown earlier. On acceptance the
    /// cart is cleared and the checkout is `Confirmed`; on rejection it is
    /// `Failed` and the cart is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` when called out of order, or the
    /// server's rejection.
    #[instrument(skip(self))]
    pub async fn submit(&mut self) -> Result<Order> {
        if !matches!(self.state, CheckoutState::ReadyToSubmit) {
            return Err(ApiError::Validation(
                "stock must be validated before submitting".to_string(),
            ));
        }
        let Some(address) = self.address.as_ref() else {
            return Err(ApiError::Validation(
                "select a delivery address first".to_string(),
            ));
        };

        self.state = CheckoutState::Submitting;

        let summary = self.cart.summary();
        let quote = self
            .pricing
            .quote(&summary, self.coupon.as_ref(), Utc::now());
        let totals = OrderTotals {
            subtotal: summary.subtotal,
            tax: summary.tax,
            delivery_charge: quote.delivery_charge,
            discount: quote.discount,
            total: quote.final_total,
        };
        let coupon_code = self.coupon.as_ref().map(|c| c.code.as_str());

        match self
            .orders
            .create(address.id, PaymentMode::Cod, &totals, coupon_code)
            .await
        {
            Ok(order) => {
                if let Err(error) = self.cart.clear().await {
                    warn!(%error, "order placed but cart clear failed");
                }
                self.coupon = None;
                self.state = CheckoutState::Confirmed {
                    order: order.clone(),
                };
                Ok(order)
            }
            Err(error) => {
                self.state = CheckoutState::Failed {
                    reason: error.to_string(),
                };
                Err(error)
            }
        }
    }
}
