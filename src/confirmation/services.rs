use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::info;

use super::events::{self, Classified, PaymentConfirmed};
use crate::{
    config::StripeConfig,
    error::{AppError, AppResult},
    orders::{
        self,
        lifecycle::{self, Settlement},
        OrderRow,
    },
    payments::verify_signature,
};

#[derive(Debug)]
pub enum WebhookOutcome {
    Settled(OrderRow),
    Ignored(String),
}

/// Authenticates the raw body and classifies the event. Runs before any
/// order lookup so a bad signature reveals nothing about orders.
pub fn authenticate(
    payload: &[u8],
    signature: Option<&str>,
    cfg: &StripeConfig,
    now: OffsetDateTime,
) -> AppResult<Classified> {
    verify_signature(
        payload,
        signature,
        &cfg.webhook_secret,
        now.unix_timestamp(),
        cfg.webhook_tolerance_secs,
    )
    .map_err(|e| AppError::Authentication(e.to_string()))?;
    let event = events::parse_event(payload)?;
    info!(event_id = ?event.id, kind = %event.kind, "webhook received");
    events::classify(&event)
}

/// Rewrites the order from the provider's figures. Repeat deliveries
/// write the same values.
pub async fn settle_payment(db: &PgPool, confirmed: &PaymentConfirmed) -> AppResult<OrderRow> {
    let order = orders::repo::find_by_id(db, confirmed.order_id)
        .await?
        .ok_or(AppError::NotFound("Order"))?;
    let settled = lifecycle::settle(
        &order,
        Settlement {
            discount_cents: confirmed.discount_cents,
        },
    )?;
    let updated = orders::repo::apply_settlement(
        db,
        order.id,
        settled.status,
        settled.discount_cents,
        settled.total_cents,
    )
    .await?
    .ok_or(AppError::NotFound("Order"))?;
    info!(
        order_id = %updated.id,
        session_id = %confirmed.session_id,
        quoted_discount = order.discount_cents,
        settled_discount = settled.discount_cents,
        total_cents = settled.total_cents,
        "payment settled"
    );
    Ok(updated)
}

pub async fn handle_payment_confirmed(
    db: &PgPool,
    payload: &[u8],
    signature: Option<&str>,
    cfg: &StripeConfig,
    now: OffsetDateTime,
) -> AppResult<WebhookOutcome> {
    match authenticate(payload, signature, cfg, now)? {
        Classified::Confirmed(confirmed) => Ok(WebhookOutcome::Settled(settle_payment(db, &confirmed).await?)),
        Classified::Ignored(kind) => Ok(WebhookOutcome::Ignored(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::sign;
    use serde_json::json;
    use uuid::Uuid;

    fn cfg() -> StripeConfig {
        StripeConfig {
            secret_key: "sk_test".into(),
            webhook_secret: "whsec_test".into(),
            api_base: "https://stripe.invalid".into(),
            currency: "usd".into(),
            webhook_tolerance_secs: 300,
        }
    }

    fn body(order_id: Uuid) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": "cs_test_1",
                "payment_status": "paid",
                "metadata": {"orderId": order_id.to_string()},
                "total_details": {"amount_discount": 500}
            }}
        }))
        .unwrap()
    }

    #[test]
    fn signed_event_is_classified() {
        let now = OffsetDateTime::now_utc();
        let order_id = Uuid::new_v4();
        let payload = body(order_id);
        let header = sign(&payload, "whsec_test", now.unix_timestamp());
        match authenticate(&payload, Some(&header), &cfg(), now).unwrap() {
            Classified::Confirmed(c) => {
                assert_eq!(c.order_id, order_id);
                assert_eq!(c.discount_cents, 500);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tampered_or_unsigned_bodies_are_rejected() {
        let now = OffsetDateTime::now_utc();
        let payload = body(Uuid::new_v4());
        let header = sign(&payload, "whsec_test", now.unix_timestamp());
        let mut tampered = payload.clone();
        tampered.extend_from_slice(b" ");

        for (bytes, sig) in [(&tampered, Some(header.as_str())), (&payload, None)] {
            let err = authenticate(bytes, sig, &cfg(), now).unwrap_err();
            assert!(matches!(err, AppError::Authentication(_)));
            assert_eq!(err.public_message(), "Invalid webhook signature");
        }
    }

    #[test]
    fn stale_signature_is_rejected() {
        let now = OffsetDateTime::now_utc();
        let payload = body(Uuid::new_v4());
        let header = sign(&payload, "whsec_test", now.unix_timestamp() - 3600);
        assert!(matches!(
            authenticate(&payload, Some(&header), &cfg(), now),
            Err(AppError::Authentication(_))
        ));
    }
}
