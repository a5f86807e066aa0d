//! Contract with the hosted payment provider.

mod signature;
pub mod stripe;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

pub use signature::verify_signature;

#[cfg(test)]
pub use signature::sign;

/// Discount terms of a provider coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponTerms {
    PercentOff(i32),
    AmountOff(i64),
}

/// A promotion code + coupon pair to create at the provider.
#[derive(Debug, Clone)]
pub struct PromotionSpec {
    pub code: String,
    pub kind: &'static str,
    pub terms: CouponTerms,
    pub min_subtotal_cents: Option<i64>,
    pub expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPromotion {
    pub coupon_id: String,
    pub promotion_code_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSpec {
    pub id: String,
    pub name: String,
}

/// One line of a hosted checkout page. Lines without a product are never
/// eligible for a scoped coupon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLine {
    pub product_id: Option<String>,
    pub name: String,
    pub unit_amount_cents: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub order_id: Uuid,
    pub customer_email: String,
    pub lines: Vec<SessionLine>,
    pub coupon_id: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_promotion(&self, spec: &PromotionSpec) -> anyhow::Result<ProviderPromotion>;

    async fn set_promotion_active(&self, promotion_code_id: &str, active: bool)
        -> anyhow::Result<()>;

    async fn delete_coupon(&self, coupon_id: &str) -> anyhow::Result<()>;

    /// Whether any succeeded charge exists for a customer with this e-mail.
    async fn has_prior_payment(&self, email: &str) -> anyhow::Result<bool>;

    /// Creates the product, or refreshes its name if it already exists.
    async fn ensure_product(&self, product: &ProductSpec) -> anyhow::Result<()>;

    /// Single-use coupon restricted to `product_ids`; returns the coupon id.
    async fn create_scoped_coupon(
        &self,
        terms: CouponTerms,
        product_ids: &[String],
        order_id: Uuid,
    ) -> anyhow::Result<String>;

    async fn create_checkout_session(&self, req: &SessionRequest)
        -> anyhow::Result<CheckoutSession>;
}
