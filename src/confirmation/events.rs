//! The slice of provider webhook events the bakery acts on.

use std::collections::HashMap;

use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const SESSION_COMPLETED: &str = "checkout.session.completed";
pub const ASYNC_PAYMENT_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";

#[derive(Debug, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
    #[serde(default)]
    total_details: Option<TotalDetails>,
    #[serde(default)]
    payment_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TotalDetails {
    #[serde(default)]
    amount_discount: Option<i64>,
}

/// Money has moved for this order; `discount_cents` is what the provider applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmed {
    pub order_id: Uuid,
    pub session_id: String,
    pub discount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Confirmed(PaymentConfirmed),
    Ignored(String),
}

pub fn parse_event(payload: &[u8]) -> AppResult<Event> {
    serde_json::from_slice(payload).map_err(|_| AppError::validation("Malformed event payload"))
}

pub fn classify(event: &Event) -> AppResult<Classified> {
    if event.kind != SESSION_COMPLETED && event.kind != ASYNC_PAYMENT_SUCCEEDED {
        return Ok(Classified::Ignored(event.kind.clone()));
    }
    let session: SessionObject = serde_json::from_value(event.data.object.clone())
        .map_err(|_| AppError::validation("Malformed checkout session"))?;
    // Delayed payment methods complete first and settle later.
    if event.kind == SESSION_COMPLETED && session.payment_status.as_deref() == Some("unpaid") {
        return Ok(Classified::Ignored(format!("{} (unpaid)", event.kind)));
    }
    let order_id = session
        .metadata
        .get("orderId")
        .ok_or_else(|| AppError::validation("No orderId in metadata"))?;
    let order_id = Uuid::parse_str(order_id)
        .map_err(|_| AppError::validation("Malformed orderId in metadata"))?;
    let discount_cents = session
        .total_details
        .and_then(|t| t.amount_discount)
        .unwrap_or(0);
    Ok(Classified::Confirmed(PaymentConfirmed {
        order_id,
        session_id: session.id,
        discount_cents,
    }))
}
