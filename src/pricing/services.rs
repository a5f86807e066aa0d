use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use super::rules::{self, CartLine, DiscountCheck, PricedLine, NEWCOMER_ONLY};
use crate::{
    discounts::{self, DiscountKind, DiscountRow},
    error::{AppError, AppResult},
    menu,
    orders,
    payments::PaymentGateway,
};

/// Prior successful payments of a customer.
#[async_trait]
pub trait PaymentHistory: Send + Sync {
    async fn has_prior_payment(&self, email: &str) -> AppResult<bool>;
}

/// Provider charge history first, then locally settled orders.
pub struct StoreHistory<'a> {
    pub db: &'a PgPool,
    pub payments: &'a dyn PaymentGateway,
}

#[async_trait]
impl PaymentHistory for StoreHistory<'_> {
    async fn has_prior_payment(&self, email: &str) -> AppResult<bool> {
        if self
            .payments
            .has_prior_payment(email)
            .await
            .map_err(AppError::Upstream)?
        {
            return Ok(true);
        }
        Ok(orders::repo::has_settled_order(self.db, email).await?)
    }
}

/// Prices a cart against current menu rows.
pub async fn price_cart(db: &PgPool, cart: &[CartLine]) -> AppResult<(Vec<PricedLine>, i64)> {
    let mut ids: Vec<Uuid> = cart.iter().map(|l| l.menu_item_id).collect();
    ids.sort();
    ids.dedup();
    let items: HashMap<Uuid, _> = menu::repo::find_many(db, &ids)
        .await?
        .into_iter()
        .map(|row| (row.id, row))
        .collect();
    let lines = rules::price_lines(cart, &items)?;
    let subtotal = rules::subtotal(&lines)?;
    Ok((lines, subtotal))
}

/// Looks up `code` case-insensitively and checks it against the subtotal.
pub async fn validate_discount(
    db: &PgPool,
    history: &dyn PaymentHistory,
    code: &str,
    email: Option<&str>,
    subtotal_cents: i64,
    now: OffsetDateTime,
) -> AppResult<DiscountCheck> {
    let code = rules::normalize_code(code);
    if code.is_empty() {
        return Err(AppError::validation("code is required"));
    }
    if subtotal_cents < 0 {
        return Err(AppError::validation("subtotal must not be negative"));
    }
    let discount = discounts::repo::find_by_code(db, &code).await?;
    let check = check_discount(discount.as_ref(), history, email, subtotal_cents, now).await?;
    debug!(%code, valid = check.valid, discount_cents = check.discount_cents, "promotion checked");
    Ok(check)
}

pub(crate) async fn check_discount(
    discount: Option<&DiscountRow>,
    history: &dyn PaymentHistory,
    email: Option<&str>,
    subtotal_cents: i64,
    now: OffsetDateTime,
) -> AppResult<DiscountCheck> {
    let check = match rules::evaluate_discount(discount, subtotal_cents, email, now) {
        Ok(check) => check,
        Err(rejected) => return Ok(rejected),
    };
    if check.kind == Some(DiscountKind::Newcomer) {
        let email = email.map(|e| e.trim().to_lowercase()).unwrap_or_default();
        if history.has_prior_payment(&email).await? {
            info!(%email, "newcomer promotion refused to returning customer");
            return Ok(DiscountCheck::rejected(NEWCOMER_ONLY));
        }
    }
    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{payments::fake::FakeGateway, pricing::rules::tests::discount};

    struct ProviderOnly(FakeGateway);

    #[async_trait]
    impl PaymentHistory for ProviderOnly {
        async fn has_prior_payment(&self, email: &str) -> AppResult<bool> {
            self.0.has_prior_payment(email).await.map_err(AppError::Upstream)
        }
    }

    #[tokio::test]
    async fn newcomer_code_refused_after_prior_charge() {
        let welcome = discount("WELCOME10", DiscountKind::Newcomer);
        let now = OffsetDateTime::now_utc();

        let returning = ProviderOnly(FakeGateway::with_charged_email("regular@example.com"));
        let check = check_discount(Some(&welcome), &returning, Some("Regular@Example.com"), 1000, now)
            .await
            .unwrap();
        assert!(!check.valid);
        assert_eq!(check.reason.as_deref(), Some(NEWCOMER_ONLY));

        let fresh = ProviderOnly(FakeGateway::default());
        let check = check_discount(Some(&welcome), &fresh, Some("new@example.com"), 1000, now)
            .await
            .unwrap();
        assert!(check.valid);
        assert_eq!(check.discount_cents, 500);
    }

    #[tokio::test]
    async fn rejected_codes_skip_history_lookup() {
        struct Unreachable;
        #[async_trait]
        impl PaymentHistory for Unreachable {
            async fn has_prior_payment(&self, _email: &str) -> AppResult<bool> {
                Err(AppError::Upstream(anyhow::anyhow!("must not be called")))
            }
        }
        let check = check_discount(None, &Unreachable, Some("a@b.co"), 1000, OffsetDateTime::now_utc())
            .await
            .unwrap();
        assert!(!check.valid);
    }
}
