use std::{collections::HashMap, time::Duration as StdDuration};

use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;
use time::{Date, OffsetDateTime};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    dto::{CreateOrderRequest, DayCount},
    lifecycle::{self, Quote},
    repo::{self, OrderFilter},
    repo_types::{NewOrder, OrderItemRow, OrderRow, OrderStatus},
};
use crate::{
    availability,
    calendar::{self, BusinessCalendar, TimeSlot},
    discounts,
    error::{AppError, AppResult},
    pricing::{
        self,
        services::{check_discount, StoreHistory},
        CartLine,
    },
    state::AppState,
};

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn required(value: Option<String>, field: &str) -> AppResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(format!("Missing required field: {field}")))
}

/// Validates the cart and pickup slot and stores a pending order.
pub async fn create_order(st: &AppState, req: CreateOrderRequest, now: OffsetDateTime) -> AppResult<Uuid> {
    let customer_email = required(req.customer_email, "customerEmail")?.to_lowercase();
    let customer_name = required(req.customer_name, "customerName")?;
    let pickup_date = calendar::parse_date(&required(req.pickup_date, "pickupDate")?)?;
    let pickup_time: TimeSlot = required(req.pickup_time, "pickupTime")?.parse()?;
    let cart = req
        .cart
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::validation("Missing required field: cart"))?;
    if !is_valid_email(&customer_email) {
        return Err(AppError::validation("Invalid email address"));
    }
    let tip_cents = pricing::rules::validate_tip(req.tip_cents)?;

    if !st.calendar.is_orderable(pickup_date, now) {
        return Err(AppError::AvailabilityClosed);
    }
    let day = availability::services::get_availability(&st.db, pickup_date).await?;
    if !day.offers(pickup_time) {
        return Err(AppError::AvailabilityClosed);
    }

    let (lines, subtotal_cents) = pricing::services::price_cart(&st.db, &cart).await?;

    let mut quote = Quote {
        subtotal_cents,
        discount_cents: 0,
        tip_cents,
        discount_code: None,
        promotion_code_id: None,
    };
    if let Some(code) = req.discount_code.as_deref().map(pricing::rules::normalize_code) {
        if !code.is_empty() {
            let discount = discounts::repo::find_by_code(&st.db, &code).await?;
            let history = StoreHistory {
                db: &st.db,
                payments: st.payments.as_ref(),
            };
            let check = check_discount(
                discount.as_ref(),
                &history,
                Some(&customer_email),
                subtotal_cents,
                now,
            )
            .await?;
            if !check.valid {
                return Err(AppError::Validation(
                    check.reason.unwrap_or_else(|| pricing::rules::INVALID_CODE.into()),
                ));
            }
            quote.discount_cents = check.discount_cents;
            quote.discount_code = Some(code);
            quote.promotion_code_id = check.promotion_code_id;
        }
    }
    if let Some(claimed) = req.discount_cents.filter(|c| *c != quote.discount_cents) {
        warn!(claimed, quoted = quote.discount_cents, "client discount estimate differs from quote");
    }

    let order = NewOrder {
        id: Uuid::new_v4(),
        customer_name,
        customer_email,
        pickup_date,
        pickup_time: pickup_time.to_string(),
        notes: req.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        subtotal_cents: quote.subtotal_cents,
        discount_cents: quote.discount_cents,
        tip_cents: quote.tip_cents,
        total_cents: quote.total_cents()?,
        discount_code: quote.discount_code.clone(),
        promotion_code_id: quote.promotion_code_id.clone(),
    };

    let mut tx = st.db.begin().await.context("begin tx")?;
    repo::insert_order_tx(&mut tx, &order).await?;
    for line in &lines {
        repo::insert_item_tx(&mut tx, order.id, line).await?;
    }
    tx.commit().await.context("commit tx")?;

    info!(
        order_id = %order.id,
        pickup_date = %order.pickup_date,
        pickup_time = %order.pickup_time,
        total_cents = order.total_cents,
        "order created"
    );
    Ok(order.id)
}

/// Pairs each order with its line items using one item query.
async fn with_items(db: &PgPool, orders: Vec<OrderRow>) -> AppResult<Vec<(OrderRow, Vec<OrderItemRow>)>> {
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut by_order: HashMap<Uuid, Vec<OrderItemRow>> = HashMap::new();
    if !ids.is_empty() {
        for item in repo::items_for_orders(db, &ids).await? {
            by_order.entry(item.order_id).or_default().push(item);
        }
    }
    Ok(orders
        .into_iter()
        .map(|o| {
            let items = by_order.remove(&o.id).unwrap_or_default();
            (o, items)
        })
        .collect())
}

pub async fn get_order(db: &PgPool, id: Uuid) -> AppResult<(OrderRow, Vec<OrderItemRow>)> {
    let order = repo::find_by_id(db, id).await?.ok_or(AppError::NotFound("Order"))?;
    let mut loaded = with_items(db, vec![order]).await?;
    loaded.pop().ok_or(AppError::NotFound("Order"))
}

pub async fn mark_fulfilled(db: &PgPool, id: Uuid) -> AppResult<(OrderRow, Vec<OrderItemRow>)> {
    let order = repo::mark_fulfilled(db, id).await?.ok_or(AppError::NotFound("Order"))?;
    info!(order_id = %id, "order marked fulfilled");
    let mut loaded = with_items(db, vec![order]).await?;
    loaded.pop().ok_or(AppError::NotFound("Order"))
}

/// Fulfils paid orders whose pickup slot has ended. Safe to run concurrently.
pub async fn auto_fulfill_expired(
    db: &PgPool,
    calendar: &BusinessCalendar,
    now: OffsetDateTime,
) -> AppResult<u64> {
    let candidates = repo::paid_through(db, calendar.today(now)).await?;
    let expired = lifecycle::expired_order_ids(&candidates, calendar, now);
    if expired.is_empty() {
        return Ok(0);
    }
    let moved = repo::fulfill_paid(db, &expired).await?;
    if moved > 0 {
        info!(moved, "auto-fulfilled orders past their pickup slot");
    }
    Ok(moved)
}

/// Periodic sweep alongside the one run before each admin listing.
pub fn spawn_fulfillment_sweep(state: AppState) -> JoinHandle<()> {
    let every = StdDuration::from_secs(state.config.business.fulfill_sweep_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = auto_fulfill_expired(&state.db, &state.calendar, OffsetDateTime::now_utc()).await {
                error!(error = %e, "fulfilment sweep failed");
            }
        }
    })
}

/// Deletes a pending order and hands back its lines so the caller can
/// rebuild the cart. An already-deleted order yields an empty cart.
pub async fn cancel_pending(db: &PgPool, id: Uuid) -> AppResult<Vec<CartLine>> {
    let Some(order) = repo::find_by_id(db, id).await? else {
        info!(order_id = %id, "cancel for missing order treated as done");
        return Ok(Vec::new());
    };
    if !matches!(order.status(), Ok(OrderStatus::Pending)) {
        return Err(AppError::conflict("Order is no longer pending"));
    }
    let items = repo::items_for_orders(db, &[id]).await?;
    let cart = cart_from_items(&items)?;
    if !repo::delete_pending(db, id).await? {
        return match repo::find_by_id(db, id).await? {
            None => Ok(cart),
            Some(_) => Err(AppError::conflict("Order is no longer pending")),
        };
    }
    info!(order_id = %id, lines = cart.len(), "pending order cancelled");
    Ok(cart)
}

fn cart_from_items(items: &[OrderItemRow]) -> AppResult<Vec<CartLine>> {
    items
        .iter()
        .map(|i| -> AppResult<CartLine> {
            Ok(CartLine {
                menu_item_id: i.menu_item_id,
                variant: i.variant()?,
                quantity: i.quantity,
            })
        })
        .collect()
}

/// Admin listing; sweeps expired orders first.
pub async fn list_orders(
    db: &PgPool,
    calendar: &BusinessCalendar,
    filter: OrderFilter,
    now: OffsetDateTime,
) -> AppResult<Vec<(OrderRow, Vec<OrderItemRow>)>> {
    auto_fulfill_expired(db, calendar, now).await?;
    let rows = repo::list(db, filter, calendar.today(now)).await?;
    with_items(db, rows).await
}

pub fn parse_filter(tab: Option<&str>, date: Option<&str>) -> AppResult<OrderFilter> {
    if let Some(raw) = date.map(str::trim).filter(|d| !d.is_empty()) {
        return Ok(OrderFilter::ForDate(calendar::parse_date(raw)?));
    }
    match tab.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("upcoming") => Ok(OrderFilter::Upcoming),
        Some("past") => Ok(OrderFilter::Past),
        Some(other) => Err(AppError::validation(format!("Unknown tab: {other}"))),
    }
}

/// Orders per pickup day over `[start, end]`, zero-filled.
pub async fn orders_range(db: &PgPool, start: Date, end: Date) -> AppResult<Vec<DayCount>> {
    let days = calendar::days_in_range(start, end)?;
    let counts: HashMap<Date, i64> = repo::counts_between(db, start, end)
        .await?
        .into_iter()
        .map(|r| (r.day, r.order_count))
        .collect();
    Ok(days
        .into_iter()
        .map(|date| DayCount {
            date,
            order_count: counts.get(&date).copied().unwrap_or(0),
        })
        .collect())
}
