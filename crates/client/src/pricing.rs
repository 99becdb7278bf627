//! Pure pricing computation: delivery charge, coupon discounts, final total.
//!
//! Nothing here touches the network. The checkout orchestrator feeds this
//! module the canonical cart summary at submission time so the charge is
//! never computed from stale navigation state.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::cart::CartSummary;

/// Orders above this subtotal ship free.
const FREE_DELIVERY_THRESHOLD: i64 = 500;
/// Flat delivery fee below the threshold.
const FLAT_DELIVERY_FEE: i64 = 50;

// ─────────────────────────────────────────────────────────────────────────────
// Coupons
// ─────────────────────────────────────────────────────────────────────────────

/// Why a coupon was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("coupon is not active yet")]
    NotYetActive,
    #[error("coupon has expired")]
    Expired,
    #[error("coupon usage limit reached")]
    Exhausted,
}

/// Discount shape of a coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponKind {
    /// Fixed amount off, regardless of subtotal.
    Flat(Decimal),
    /// Percentage of the subtotal.
    Percentage(Decimal),
}

/// A coupon record fetched on demand at checkout. Never persisted; discarded
/// when checkout completes or the coupon field is cleared.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "CouponRecord")]
pub struct Coupon {
    pub code: String,
    pub kind: CouponKind,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: DateTime<Utc>,
    /// Optional end time-of-day; when present it is substituted onto the
    /// expiry date instead of the date's own time.
    pub end_time: Option<NaiveTime>,
    pub remaining_uses: i64,
}

impl Coupon {
    /// The instant at which the coupon stops being valid.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        match self.end_time {
            Some(time) => self.valid_to.date_naive().and_time(time).and_utc(),
            None => self.valid_to,
        }
    }

    /// Acceptance predicate, evaluated before any discount is applied.
    ///
    /// # Errors
    ///
    /// Returns the specific [`CouponRejection`] reason.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), CouponRejection> {
        if let Some(from) = self.valid_from
            && now < from
        {
            return Err(CouponRejection::NotYetActive);
        }
        if now > self.expires_at() {
            return Err(CouponRejection::Expired);
        }
        if self.remaining_uses <= 0 {
            return Err(CouponRejection::Exhausted);
        }
        Ok(())
    }

    /// Discount amount for a given subtotal (unclamped).
    #[must_use]
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        match self.kind {
            CouponKind::Flat(value) => value,
            CouponKind::Percentage(value) => value / Decimal::ONE_HUNDRED * subtotal,
        }
    }
}

/// Wire form of a coupon as the API returns it.
#[derive(Debug, Deserialize)]
struct CouponRecord {
    code: String,
    #[serde(default)]
    flat_discount: Option<Decimal>,
    #[serde(default)]
    percentage_discount: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    valid_from_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "deserialize_date")]
    valid_to_date: DateTime<Utc>,
    #[serde(default, deserialize_with = "deserialize_optional_time")]
    end_time: Option<NaiveTime>,
    quantity: i64,
}

impl TryFrom<CouponRecord> for Coupon {
    type Error = String;

    fn try_from(record: CouponRecord) -> Result<Self, Self::Error> {
        let kind = match (record.flat_discount, record.percentage_discount) {
            (Some(flat), _) => CouponKind::Flat(flat),
            (None, Some(percentage)) => CouponKind::Percentage(percentage),
            (None, None) => {
                return Err(format!(
                    "coupon {} has neither flat nor percentage discount",
                    record.code
                ));
            }
        };

        Ok(Self {
            code: record.code,
            kind,
            valid_from: record.valid_from_date,
            valid_to: record.valid_to_date,
            end_time: record.end_time,
            remaining_uses: record.quantity,
        })
    }
}

/// Accept either an RFC 3339 datetime or a bare `YYYY-MM-DD` date (which
/// means midnight UTC, matching how the server stores validity dates).
fn parse_date(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| format!("invalid date: {raw}"));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid date {raw}: {e}"))
}

fn deserialize_date<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(de)?;
    parse_date(&raw).map_err(serde::de::Error::custom)
}

fn deserialize_optional_date<'de, D: Deserializer<'de>>(
    de: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<String>::deserialize(de)?;
    raw.map(|s| parse_date(&s).map_err(serde::de::Error::custom))
        .transpose()
}

/// Accept `HH:MM` or `HH:MM:SS` end times.
fn deserialize_optional_time<'de, D: Deserializer<'de>>(
    de: D,
) -> Result<Option<NaiveTime>, D::Error> {
    let raw = Option::<String>::deserialize(de)?;
    raw.map(|s| {
        NaiveTime::parse_from_str(&s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
            .map_err(|e| serde::de::Error::custom(format!("invalid end_time {s}: {e}")))
    })
    .transpose()
}

// ─────────────────────────────────────────────────────────────────────────────
// Delivery policy and quotes
// ─────────────────────────────────────────────────────────────────────────────

/// Flat delivery fee waived above a subtotal threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub free_threshold: Decimal,
    pub flat_fee: Decimal,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            free_threshold: Decimal::from(FREE_DELIVERY_THRESHOLD),
            flat_fee: Decimal::from(FLAT_DELIVERY_FEE),
        }
    }
}

/// A computed price breakdown for an order about to be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub delivery_charge: Decimal,
    pub discount: Decimal,
    pub final_total: Decimal,
}

/// Pure pricing over a delivery policy.
#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    policy: DeliveryPolicy,
}

impl PricingEngine {
    /// Create an engine with a non-default policy.
    #[must_use]
    pub const fn new(policy: DeliveryPolicy) -> Self {
        Self { policy }
    }

    /// Delivery charge for a subtotal: zero above the free threshold, the
    /// flat fee at or below it.
    #[must_use]
    pub fn delivery_charge(&self, subtotal: Decimal) -> Decimal {
        if subtotal > self.policy.free_threshold {
            Decimal::ZERO
        } else {
            self.policy.flat_fee
        }
    }

    /// Compute the full breakdown from a cart summary and an optional coupon.
    ///
    /// A coupon failing its acceptance predicate contributes zero discount;
    /// callers that need the rejection reason run [`Coupon::validate`] first.
    /// The final total is clamped at zero - a discount can never push the
    /// order value negative.
    #[must_use]
    pub fn quote(&self, summary: &CartSummary, coupon: Option<&Coupon>, now: DateTime<Utc>) -> Quote {
        let delivery_charge = self.delivery_charge(summary.subtotal);

        let discount = coupon
            .filter(|c| c.validate(now).is_ok())
            .map_or(Decimal::ZERO, |c| c.discount_for(summary.subtotal));

        let final_total =
            (summary.subtotal + summary.tax + delivery_charge - discount).max(Decimal::ZERO);

        Quote {
            delivery_charge,
            discount,
            final_total,
        }
    }
}
