use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::repo_types::{OrderItemRow, OrderRow};
use crate::{calendar::iso_date, pricing::CartLine};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub pickup_date: Option<String>,
    pub pickup_time: Option<String>,
    pub notes: Option<String>,
    pub tip_cents: Option<i64>,
    pub discount_code: Option<String>,
    /// Client-side estimate; never stored.
    pub discount_cents: Option<i64>,
    pub cart: Option<Vec<CartLine>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemDto {
    pub id: Uuid,
    pub menu_item_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub variant: String,
    pub unit_price_cents: i64,
}

impl From<OrderItemRow> for OrderItemDto {
    fn from(r: OrderItemRow) -> Self {
        Self {
            id: r.id,
            menu_item_id: r.menu_item_id,
            name: r.name,
            quantity: r.quantity,
            variant: r.variant,
            unit_price_cents: r.unit_price_cents,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    pub id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    #[serde(with = "iso_date")]
    pub pickup_date: Date,
    pub pickup_time: String,
    pub notes: Option<String>,
    pub status: String,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tip_cents: i64,
    pub total_cents: i64,
    pub discount_code: Option<String>,
    pub promotion_code_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub paid_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub fulfilled_at: Option<OffsetDateTime>,
    pub order_items: Vec<OrderItemDto>,
}

impl OrderDto {
    pub fn new(o: OrderRow, items: Vec<OrderItemRow>) -> Self {
        Self {
            id: o.id,
            customer_name: o.customer_name,
            customer_email: o.customer_email,
            pickup_date: o.pickup_date,
            pickup_time: o.pickup_time,
            notes: o.notes,
            status: o.status,
            subtotal_cents: o.subtotal_cents,
            discount_cents: o.discount_cents,
            tip_cents: o.tip_cents,
            total_cents: o.total_cents,
            discount_code: o.discount_code,
            promotion_code_id: o.promotion_code_id,
            created_at: o.created_at,
            paid_at: o.paid_at,
            fulfilled_at: o.fulfilled_at,
            order_items: items.into_iter().map(OrderItemDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<OrderDto>,
}

#[derive(Debug, Serialize)]
pub struct FulfilledResponse {
    pub success: bool,
    pub order: OrderDto,
}

#[derive(Debug, Serialize)]
pub struct CancelledResponse {
    pub success: bool,
    pub cart: Vec<CartLine>,
}

#[derive(Debug, Deserialize)]
pub struct AdminOrdersQuery {
    pub tab: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCount {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub order_count: i64,
}
