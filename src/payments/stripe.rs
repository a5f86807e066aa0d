use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    CheckoutSession, CouponTerms, PaymentGateway, ProductSpec, PromotionSpec, ProviderPromotion,
    SessionRequest,
};
use crate::config::StripeConfig;

type Form = Vec<(String, String)>;

#[derive(Debug, Error)]
#[error("stripe {status}: {message} ({code:?})")]
pub struct StripeApiError {
    pub status: u16,
    pub code: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Debug, Deserialize)]
struct List<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Charge {
    status: String,
}

#[derive(Debug, Deserialize)]
struct Session {
    id: String,
    url: Option<String>,
}

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
    currency: String,
}

impl StripeClient {
    pub fn new(cfg: &StripeConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            secret_key: cfg.secret_key.clone(),
            currency: cfg.currency.clone(),
        })
    }

    async fn decode(resp: reqwest::Response) -> anyhow::Result<Value> {
        let status = resp.status();
        let body = resp.text().await.context("read stripe response")?;
        if status.is_success() {
            return serde_json::from_str(&body).context("decode stripe response");
        }
        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(env) => (env.error.code, env.error.message),
            Err(_) => (None, body),
        };
        Err(StripeApiError {
            status: status.as_u16(),
            code,
            message,
        }
        .into())
    }

    async fn post(&self, path: &str, form: &Form) -> anyhow::Result<Value> {
        let resp = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .with_context(|| format!("POST {path}"))?;
        Self::decode(resp).await
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> anyhow::Result<Value> {
        let resp = self
            .http
            .get(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {path}"))?;
        Self::decode(resp).await
    }

    async fn delete(&self, path: &str) -> anyhow::Result<Value> {
        let resp = self
            .http
            .delete(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .with_context(|| format!("DELETE {path}"))?;
        Self::decode(resp).await
    }
}

fn push(form: &mut Form, key: impl Into<String>, value: impl ToString) {
    form.push((key.into(), value.to_string()));
}

fn push_terms(form: &mut Form, terms: CouponTerms, currency: &str) {
    match terms {
        CouponTerms::PercentOff(pct) => push(form, "percent_off", pct),
        CouponTerms::AmountOff(cents) => {
            push(form, "amount_off", cents);
            push(form, "currency", currency);
        }
    }
}

fn coupon_form(spec: &PromotionSpec, currency: &str) -> Form {
    let mut form = Form::new();
    push(&mut form, "duration", "once");
    push_terms(&mut form, spec.terms, currency);
    push(&mut form, "metadata[type]", spec.kind);
    if let Some(expires_at) = spec.expires_at {
        push(&mut form, "redeem_by", expires_at.unix_timestamp());
    }
    form
}

fn promotion_code_form(spec: &PromotionSpec, coupon_id: &str, currency: &str) -> Form {
    let mut form = Form::new();
    push(&mut form, "coupon", coupon_id);
    push(&mut form, "code", &spec.code);
    push(&mut form, "metadata[type]", spec.kind);
    if let Some(min) = spec.min_subtotal_cents {
        push(&mut form, "restrictions[minimum_amount]", min);
        push(&mut form, "restrictions[minimum_amount_currency]", currency);
    }
    if let Some(expires_at) = spec.expires_at {
        push(&mut form, "expires_at", expires_at.unix_timestamp());
    }
    form
}

fn scoped_coupon_form(
    terms: CouponTerms,
    product_ids: &[String],
    order_id: Uuid,
    currency: &str,
) -> Form {
    let mut form = Form::new();
    push(&mut form, "duration", "once");
    push(&mut form, "max_redemptions", 1);
    push_terms(&mut form, terms, currency);
    for (i, product) in product_ids.iter().enumerate() {
        push(&mut form, format!("applies_to[products][{i}]"), product);
    }
    push(&mut form, "metadata[orderId]", order_id);
    form
}

fn session_form(req: &SessionRequest, currency: &str) -> Form {
    let mut form = Form::new();
    push(&mut form, "mode", "payment");
    push(&mut form, "payment_method_types[0]", "card");
    push(&mut form, "customer_email", &req.customer_email);
    push(&mut form, "success_url", &req.success_url);
    push(&mut form, "cancel_url", &req.cancel_url);
    push(&mut form, "client_reference_id", req.order_id);
    push(&mut form, "metadata[orderId]", req.order_id);
    for (i, line) in req.lines.iter().enumerate() {
        let p = format!("line_items[{i}]");
        push(&mut form, format!("{p}[quantity]"), line.quantity);
        push(&mut form, format!("{p}[price_data][currency]"), currency);
        push(&mut form, format!("{p}[price_data][unit_amount]"), line.unit_amount_cents);
        match &line.product_id {
            Some(product) => push(&mut form, format!("{p}[price_data][product]"), product),
            None => push(
                &mut form,
                format!("{p}[price_data][product_data][name]"),
                &line.name,
            ),
        }
    }
    if let Some(coupon) = &req.coupon_id {
        push(&mut form, "discounts[0][coupon]", coupon);
    }
    form
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[instrument(skip(self, spec), fields(code = %spec.code))]
    async fn create_promotion(&self, spec: &PromotionSpec) -> anyhow::Result<ProviderPromotion> {
        let coupon: IdOnly =
            serde_json::from_value(self.post("/v1/coupons", &coupon_form(spec, &self.currency)).await?)?;
        let form = promotion_code_form(spec, &coupon.id, &self.currency);
        let promo = match self.post("/v1/promotion_codes", &form).await {
            Ok(v) => serde_json::from_value::<IdOnly>(v)?,
            Err(e) => {
                // Do not leave an orphaned coupon behind.
                let _ = self.delete(&format!("/v1/coupons/{}", coupon.id)).await;
                return Err(e);
            }
        };
        debug!(coupon_id = %coupon.id, promotion_code_id = %promo.id, "promotion created");
        Ok(ProviderPromotion {
            coupon_id: coupon.id,
            promotion_code_id: promo.id,
        })
    }

    #[instrument(skip(self))]
    async fn set_promotion_active(&self, promotion_code_id: &str, active: bool) -> anyhow::Result<()> {
        let mut form = Form::new();
        push(&mut form, "active", active);
        self.post(&format!("/v1/promotion_codes/{promotion_code_id}"), &form)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_coupon(&self, coupon_id: &str) -> anyhow::Result<()> {
        self.delete(&format!("/v1/coupons/{coupon_id}")).await?;
        Ok(())
    }

    #[instrument(skip(self, email))]
    async fn has_prior_payment(&self, email: &str) -> anyhow::Result<bool> {
        let customers: List<IdOnly> = serde_json::from_value(
            self.get("/v1/customers", &[("email", email), ("limit", "10")])
                .await?,
        )?;
        for customer in customers.data {
            let charges: List<Charge> = serde_json::from_value(
                self.get("/v1/charges", &[("customer", customer.id.as_str()), ("limit", "20")])
                    .await?,
            )?;
            if charges.data.iter().any(|c| c.status == "succeeded") {
                return Ok(true);
            }
        }
        Ok(false)
    }

    #[instrument(skip(self, product), fields(product_id = %product.id))]
    async fn ensure_product(&self, product: &ProductSpec) -> anyhow::Result<()> {
        let mut form = Form::new();
        push(&mut form, "id", &product.id);
        push(&mut form, "name", &product.name);
        match self.post("/v1/products", &form).await {
            Ok(_) => Ok(()),
            Err(e)
                if e.downcast_ref::<StripeApiError>()
                    .and_then(|api| api.code.as_deref())
                    == Some("resource_already_exists") =>
            {
                let mut update = Form::new();
                push(&mut update, "name", &product.name);
                push(&mut update, "active", true);
                self.post(&format!("/v1/products/{}", product.id), &update)
                    .await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, product_ids))]
    async fn create_scoped_coupon(
        &self,
        terms: CouponTerms,
        product_ids: &[String],
        order_id: Uuid,
    ) -> anyhow::Result<String> {
        let form = scoped_coupon_form(terms, product_ids, order_id, &self.currency);
        let coupon: IdOnly = serde_json::from_value(self.post("/v1/coupons", &form).await?)?;
        Ok(coupon.id)
    }

    #[instrument(skip(self, req), fields(order_id = %req.order_id))]
    async fn create_checkout_session(&self, req: &SessionRequest) -> anyhow::Result<CheckoutSession> {
        let form = session_form(req, &self.currency);
        let session: Session =
            serde_json::from_value(self.post("/v1/checkout/sessions", &form).await?)?;
        let url = session
            .url
            .ok_or_else(|| anyhow::anyhow!("checkout session {} has no url", session.id))?;
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::SessionLine;

    fn value<'a>(form: &'a Form, key: &str) -> Option<&'a str> {
        form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn session_form_keeps_tip_outside_products() {
        let order_id = Uuid::new_v4();
        let req = SessionRequest {
            order_id,
            customer_email: "a@b.co".into(),
            lines: vec![
                SessionLine {
                    product_id: Some("bh_croissant_full".into()),
                    name: "Croissant (full)".into(),
                    unit_amount_cents: 450,
                    quantity: 2,
                },
                SessionLine {
                    product_id: None,
                    name: "Tip".into(),
                    unit_amount_cents: 200,
                    quantity: 1,
                },
            ],
            coupon_id: Some("co_123".into()),
            success_url: "https://shop/order/1?success=1".into(),
            cancel_url: "https://shop/order/1?canceled=1".into(),
        };
        let form = session_form(&req, "usd");
        assert_eq!(value(&form, "line_items[0][price_data][product]"), Some("bh_croissant_full"));
        assert_eq!(value(&form, "line_items[1][price_data][product]"), None);
        assert_eq!(value(&form, "line_items[1][price_data][product_data][name]"), Some("Tip"));
        assert_eq!(value(&form, "line_items[1][price_data][unit_amount]"), Some("200"));
        assert_eq!(value(&form, "discounts[0][coupon]"), Some("co_123"));
        assert_eq!(value(&form, "metadata[orderId]"), Some(order_id.to_string().as_str()));
    }

    #[test]
    fn scoped_coupon_lists_every_product() {
        let products = vec!["p1".to_string(), "p2".to_string()];
        let form = scoped_coupon_form(CouponTerms::AmountOff(500), &products, Uuid::nil(), "usd");
        assert_eq!(value(&form, "applies_to[products][0]"), Some("p1"));
        assert_eq!(value(&form, "applies_to[products][1]"), Some("p2"));
        assert_eq!(value(&form, "amount_off"), Some("500"));
        assert_eq!(value(&form, "currency"), Some("usd"));
        assert_eq!(value(&form, "max_redemptions"), Some("1"));
    }

    #[test]
    fn promotion_minimum_goes_into_restrictions() {
        let spec = PromotionSpec {
            code: "SAVE20".into(),
            kind: "percent",
            terms: CouponTerms::PercentOff(20),
            min_subtotal_cents: Some(2500),
            expires_at: None,
        };
        let coupon = coupon_form(&spec, "usd");
        assert_eq!(value(&coupon, "percent_off"), Some("20"));
        assert_eq!(value(&coupon, "currency"), None);
        let promo = promotion_code_form(&spec, "co_1", "usd");
        assert_eq!(value(&promo, "restrictions[minimum_amount]"), Some("2500"));
        assert_eq!(value(&promo, "code"), Some("SAVE20"));
    }
}
