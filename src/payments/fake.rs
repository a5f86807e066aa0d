//! In-memory provider used by unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    CheckoutSession, CouponTerms, PaymentGateway, ProductSpec, PromotionSpec, ProviderPromotion,
    SessionRequest,
};

#[derive(Default)]
struct Inner {
    charged_emails: HashSet<String>,
    products: HashMap<String, String>,
    coupons: HashMap<String, (CouponTerms, Vec<String>)>,
    promotions: HashMap<String, bool>,
    sessions: HashMap<String, SessionRequest>,
}

#[derive(Default)]
pub struct FakeGateway {
    inner: Mutex<Inner>,
}

impl FakeGateway {
    pub fn with_charged_email(email: &str) -> Self {
        let fake = Self::default();
        fake.inner
            .lock()
            .unwrap()
            .charged_emails
            .insert(email.to_lowercase());
        fake
    }

    pub fn product_name(&self, id: &str) -> Option<String> {
        self.inner.lock().unwrap().products.get(id).cloned()
    }

    pub fn promotion_active(&self, id: &str) -> Option<bool> {
        self.inner.lock().unwrap().promotions.get(id).copied()
    }

    pub fn session(&self, id: &str) -> Option<SessionRequest> {
        self.inner.lock().unwrap().sessions.get(id).cloned()
    }

    /// `(amount_discount, amount_total)` the provider would charge for a
    /// session, applying the coupon only to lines whose product it covers.
    pub fn settle(&self, session_id: &str) -> Option<(i64, i64)> {
        let inner = self.inner.lock().unwrap();
        let session = inner.sessions.get(session_id)?;
        let gross: i64 = session
            .lines
            .iter()
            .map(|l| l.unit_amount_cents * l.quantity)
            .sum();
        let discount = match session.coupon_id.as_ref().and_then(|c| inner.coupons.get(c)) {
            None => 0,
            Some((terms, products)) => {
                let eligible: i64 = session
                    .lines
                    .iter()
                    .filter(|l| l.product_id.as_ref().is_some_and(|p| products.contains(p)))
                    .map(|l| l.unit_amount_cents * l.quantity)
                    .sum();
                match *terms {
                    CouponTerms::PercentOff(pct) => eligible * pct as i64 / 100,
                    CouponTerms::AmountOff(cents) => cents.min(eligible),
                }
            }
        };
        Some((discount, gross - discount))
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_promotion(&self, spec: &PromotionSpec) -> anyhow::Result<ProviderPromotion> {
        let mut inner = self.inner.lock().unwrap();
        let coupon_id = format!("co_{}", Uuid::new_v4().simple());
        let promotion_code_id = format!("promo_{}", spec.code.to_lowercase());
        inner.coupons.insert(coupon_id.clone(), (spec.terms, Vec::new()));
        inner.promotions.insert(promotion_code_id.clone(), true);
        Ok(ProviderPromotion {
            coupon_id,
            promotion_code_id,
        })
    }

    async fn set_promotion_active(&self, promotion_code_id: &str, active: bool) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.promotions.get_mut(promotion_code_id) {
            Some(flag) => {
                *flag = active;
                Ok(())
            }
            None => anyhow::bail!("no such promotion code {promotion_code_id}"),
        }
    }

    async fn delete_coupon(&self, coupon_id: &str) -> anyhow::Result<()> {
        self.inner.lock().unwrap().coupons.remove(coupon_id);
        Ok(())
    }

    async fn has_prior_payment(&self, email: &str) -> anyhow::Result<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .charged_emails
            .contains(&email.to_lowercase()))
    }

    async fn ensure_product(&self, product: &ProductSpec) -> anyhow::Result<()> {
        self.inner
            .lock()
            .unwrap()
            .products
            .insert(product.id.clone(), product.name.clone());
        Ok(())
    }

    async fn create_scoped_coupon(
        &self,
        terms: CouponTerms,
        product_ids: &[String],
        _order_id: Uuid,
    ) -> anyhow::Result<String> {
        let id = format!("co_{}", Uuid::new_v4().simple());
        self.inner
            .lock()
            .unwrap()
            .coupons
            .insert(id.clone(), (terms, product_ids.to_vec()));
        Ok(id)
    }

    async fn create_checkout_session(&self, req: &SessionRequest) -> anyhow::Result<CheckoutSession> {
        let mut inner = self.inner.lock().unwrap();
        for line in &req.lines {
            if let Some(product) = &line.product_id {
                anyhow::ensure!(inner.products.contains_key(product), "unknown product {product}");
            }
        }
        let id = format!("cs_test_{}", Uuid::new_v4().simple());
        inner.sessions.insert(id.clone(), req.clone());
        Ok(CheckoutSession {
            url: format!("https://checkout.test/pay/{id}"),
            id,
        })
    }
}
