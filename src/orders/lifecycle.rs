//! Order state transitions and the two pricing phases.
//!
//! A [`Quote`] is written when the order is created and is advisory. A
//! [`Settlement`] comes from the payment provider once money has moved and
//! always replaces the quoted discount and total.

use time::{Duration, OffsetDateTime, Time};
use tracing::warn;
use uuid::Uuid;

use super::repo_types::{OrderRow, OrderStatus};
use crate::{
    calendar::{BusinessCalendar, TimeSlot},
    error::AppResult,
    pricing::rules::compute_total,
};

/// Pricing stored on a pending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tip_cents: i64,
    pub discount_code: Option<String>,
    pub promotion_code_id: Option<String>,
}

impl Quote {
    pub fn total_cents(&self) -> AppResult<i64> {
        compute_total(self.subtotal_cents, self.discount_cents, self.tip_cents)
    }
}

/// Discount the provider actually applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub discount_cents: i64,
}

/// Final fields written for a confirmed payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettledOrder {
    pub status: OrderStatus,
    pub discount_cents: i64,
    pub total_cents: i64,
}

/// Re-derives the total from the settlement. A fulfilled order stays
/// fulfilled; applying the same settlement twice gives the same result.
pub fn settle(order: &OrderRow, settlement: Settlement) -> AppResult<SettledOrder> {
    let status = match order.status() {
        Ok(OrderStatus::Fulfilled) => OrderStatus::Fulfilled,
        _ => OrderStatus::Paid,
    };
    Ok(SettledOrder {
        status,
        discount_cents: settlement.discount_cents,
        total_cents: compute_total(order.subtotal_cents, settlement.discount_cents, order.tip_cents)?,
    })
}

/// Instant after which a paid order counts as picked up.
pub fn pickup_deadline(calendar: &BusinessCalendar, order: &OrderRow) -> OffsetDateTime {
    match order.pickup_time.parse::<TimeSlot>() {
        Ok(slot) => calendar.slot_end(order.pickup_date, slot),
        Err(_) => {
            warn!(order_id = %order.id, pickup_time = %order.pickup_time, "unparseable pickup time");
            calendar.local_instant(order.pickup_date, Time::MIDNIGHT) + Duration::days(1)
        }
    }
}

/// Paid orders whose pickup slot has ended by `now`.
pub fn expired_order_ids(
    orders: &[OrderRow],
    calendar: &BusinessCalendar,
    now: OffsetDateTime,
) -> Vec<Uuid> {
    orders
        .iter()
        .filter(|o| matches!(o.status(), Ok(OrderStatus::Paid)))
        .filter(|o| now > pickup_deadline(calendar, o))
        .map(|o| o.id)
        .collect()
}
