use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    discounts,
    error::{AppError, AppResult},
    orders::{
        self,
        repo_types::{OrderItemRow, OrderRow},
        OrderStatus,
    },
    payments::{CheckoutSession, CouponTerms, PaymentGateway, ProductSpec, SessionLine, SessionRequest},
    pricing::{self, Variant},
    state::AppState,
};

pub const TIP_LINE_NAME: &str = "Tip";

/// Provider product for one menu item portion.
pub fn product_id(menu_item_id: Uuid, variant: Variant) -> String {
    format!("bh_{}_{}", menu_item_id.simple(), variant)
}

/// Products to upsert and the hosted-page lines built from an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    pub products: Vec<ProductSpec>,
    pub lines: Vec<SessionLine>,
}

impl CheckoutPlan {
    /// Every product a scoped coupon may touch; the tip line has none.
    pub fn discountable_products(&self) -> Vec<String> {
        self.products.iter().map(|p| p.id.clone()).collect()
    }
}

pub fn plan_checkout(items: &[OrderItemRow], tip_cents: i64) -> AppResult<CheckoutPlan> {
    if items.is_empty() {
        return Err(AppError::conflict("Order has no items"));
    }
    let mut products: Vec<ProductSpec> = Vec::new();
    let mut lines = Vec::with_capacity(items.len() + 1);
    for item in items {
        let variant = item.variant()?;
        let name = match variant {
            Variant::Full => item.name.clone(),
            Variant::Half => format!("{} (half)", item.name),
        };
        let id = product_id(item.menu_item_id, variant);
        if !products.iter().any(|p| p.id == id) {
            products.push(ProductSpec {
                id: id.clone(),
                name: name.clone(),
            });
        }
        lines.push(SessionLine {
            product_id: Some(id),
            name,
            unit_amount_cents: item.unit_price_cents,
            quantity: i64::from(item.quantity),
        });
    }
    if tip_cents > 0 {
        lines.push(SessionLine {
            product_id: None,
            name: TIP_LINE_NAME.into(),
            unit_amount_cents: tip_cents,
            quantity: 1,
        });
    }
    Ok(CheckoutPlan { products, lines })
}

/// Registers products, scopes the coupon to them, and opens the session.
pub async fn open_session(
    payments: &dyn PaymentGateway,
    order: &OrderRow,
    plan: &CheckoutPlan,
    terms: Option<CouponTerms>,
    public_base_url: &str,
) -> AppResult<CheckoutSession> {
    for product in &plan.products {
        payments.ensure_product(product).await.map_err(AppError::Upstream)?;
    }
    let coupon_id = match terms {
        Some(terms) => Some(
            payments
                .create_scoped_coupon(terms, &plan.discountable_products(), order.id)
                .await
                .map_err(AppError::Upstream)?,
        ),
        None => None,
    };
    let base = public_base_url.trim_end_matches('/');
    let req = SessionRequest {
        order_id: order.id,
        customer_email: order.customer_email.clone(),
        lines: plan.lines.clone(),
        coupon_id,
        success_url: format!("{base}/order/{}?success=1", order.id),
        cancel_url: format!("{base}/order/{}?canceled=1", order.id),
    };
    payments
        .create_checkout_session(&req)
        .await
        .map_err(AppError::Upstream)
}

/// Coupon terms of the order's code, if it is still redeemable.
async fn redeemable_terms(st: &AppState, order: &OrderRow, now: OffsetDateTime) -> AppResult<Option<CouponTerms>> {
    let Some(code) = order.discount_code.as_deref() else {
        return Ok(None);
    };
    let discount = discounts::repo::find_by_code(&st.db, code)
        .await?
        .filter(|d| d.active && !d.is_expired(now));
    match discount {
        Some(d) => Ok(Some(d.terms()?)),
        None => {
            warn!(order_id = %order.id, %code, "promotion no longer redeemable; checking out without it");
            Ok(None)
        }
    }
}

/// Returns the hosted payment page URL for a pending order.
pub async fn create_checkout_session(
    st: &AppState,
    order_id: Uuid,
    tip_cents: i64,
    now: OffsetDateTime,
) -> AppResult<String> {
    let tip_cents = pricing::rules::validate_tip(Some(tip_cents))?;
    let order = orders::repo::find_by_id(&st.db, order_id)
        .await?
        .ok_or(AppError::NotFound("Order"))?;
    if !matches!(order.status(), Ok(OrderStatus::Pending)) {
        return Err(AppError::conflict("Order is not pending"));
    }
    let order = orders::repo::set_tip(&st.db, order_id, tip_cents)
        .await?
        .ok_or_else(|| AppError::conflict("Order is not pending"))?;

    let items = orders::repo::items_for_orders(&st.db, &[order_id]).await?;
    let plan = plan_checkout(&items, order.tip_cents)?;
    let terms = redeemable_terms(st, &order, now).await?;

    let session = open_session(
        st.payments.as_ref(),
        &order,
        &plan,
        terms,
        &st.config.public_base_url,
    )
    .await?;
    orders::repo::set_checkout_session(&st.db, order_id, &session.id).await?;

    info!(
        %order_id,
        session_id = %session.id,
        lines = plan.lines.len(),
        discounted = terms.is_some(),
        "checkout session created"
    );
    Ok(session.url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        orders::lifecycle::tests::order,
        payments::fake::FakeGateway,
    };
    use time::macros::date;

    fn item(menu_item_id: Uuid, name: &str, variant: &str, quantity: i32, unit: i64) -> OrderItemRow {
        OrderItemRow {
            id: Uuid::new_v4(),
            order_id: Uuid::nil(),
            menu_item_id,
            name: name.into(),
            quantity,
            variant: variant.into(),
            unit_price_cents: unit,
        }
    }

    #[test]
    fn tip_line_has_no_product() {
        let loaf = Uuid::new_v4();
        let plan = plan_checkout(
            &[item(loaf, "Loaf", "full", 1, 1000), item(loaf, "Loaf", "half", 2, 600)],
            150,
        )
        .unwrap();
        assert_eq!(plan.products.len(), 2);
        assert_eq!(plan.lines.len(), 3);
        let tip = plan.lines.last().unwrap();
        assert_eq!(tip.product_id, None);
        assert_eq!(tip.unit_amount_cents, 150);
        assert_eq!(
            plan.discountable_products(),
            vec![product_id(loaf, Variant::Full), product_id(loaf, Variant::Half)]
        );
        assert_eq!(plan.lines[1].name, "Loaf (half)");
    }

    #[tokio::test]
    async fn checkout_refuses_oversized_tip() {
        let state = AppState::fake();
        let err = create_checkout_session(&state, Uuid::new_v4(), i64::MAX, OffsetDateTime::now_utc())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = create_checkout_session(&state, Uuid::new_v4(), -5, OffsetDateTime::now_utc())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn zero_tip_adds_no_line() {
        let plan = plan_checkout(&[item(Uuid::new_v4(), "Bun", "full", 3, 250)], 0).unwrap();
        assert_eq!(plan.lines.len(), 1);
    }

    #[tokio::test]
    async fn discount_never_touches_the_tip() {
        let gateway = FakeGateway::default();
        let mut pending = order(OrderStatus::Pending, date!(2026 - 10 - 20), "10:00");
        pending.subtotal_cents = 3000;
        pending.discount_cents = 500;
        pending.tip_cents = 200;

        let plan = plan_checkout(
            &[
                item(Uuid::new_v4(), "Country loaf", "full", 2, 1000),
                item(Uuid::new_v4(), "Croissant", "full", 2, 500),
            ],
            pending.tip_cents,
        )
        .unwrap();
        let session = open_session(
            &gateway,
            &pending,
            &plan,
            Some(CouponTerms::AmountOff(500)),
            "https://bakery.test/",
        )
        .await
        .unwrap();

        assert_eq!(gateway.settle(&session.id), Some((500, 2700)));
        assert_eq!(
            gateway.product_name(&plan.products[1].id).as_deref(),
            Some("Croissant")
        );
        let req = gateway.session(&session.id).unwrap();
        assert_eq!(
            req.success_url,
            format!("https://bakery.test/order/{}?success=1", pending.id)
        );
        assert!(req.cancel_url.ends_with("?canceled=1"));
    }

    #[tokio::test]
    async fn percent_coupon_ignores_tip() {
        let gateway = FakeGateway::default();
        let pending = order(OrderStatus::Pending, date!(2026 - 10 - 20), "10:00");
        let plan = plan_checkout(&[item(Uuid::new_v4(), "Tart", "full", 1, 3000)], 1000).unwrap();
        let session = open_session(
            &gateway,
            &pending,
            &plan,
            Some(CouponTerms::PercentOff(50)),
            "https://bakery.test",
        )
        .await
        .unwrap();
        assert_eq!(gateway.settle(&session.id), Some((1500, 2500)));
    }
}
