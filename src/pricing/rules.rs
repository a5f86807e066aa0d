//! Cart valuation and discount arithmetic. Everything here is pure.

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    discounts::{DiscountKind, DiscountRow},
    error::{AppError, AppResult},
    menu::MenuItemRow,
    payments::CouponTerms,
};

pub const INVALID_CODE: &str = "Invalid or expired promotion code";
pub const NEWCOMER_ONLY: &str = "This promotion is only for new customers";
pub const NEWCOMER_NEEDS_EMAIL: &str = "Enter your email to use this promotion";

/// Largest tip accepted on an order ($1,000).
pub const MAX_TIP_CENTS: i64 = 100_000;
pub const MAX_LINE_QUANTITY: i32 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Full,
    Half,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Full => "full",
            Variant::Half => "half",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Variant::Full),
            "half" => Ok(Variant::Half),
            other => anyhow::bail!("unknown variant {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub menu_item_id: Uuid,
    #[serde(default = "full")]
    pub variant: Variant,
    pub quantity: i32,
}

fn full() -> Variant {
    Variant::Full
}

/// A cart line with its price fixed at valuation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub menu_item_id: Uuid,
    pub name: String,
    pub variant: Variant,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

impl PricedLine {
    pub fn line_total(&self) -> Option<i64> {
        self.unit_price_cents.checked_mul(i64::from(self.quantity))
    }
}

/// Half portions fall back to the full price when no half price is set.
pub fn unit_price(item: &MenuItemRow, variant: Variant) -> i64 {
    match variant {
        Variant::Full => item.price_cents,
        Variant::Half => item.half_price_cents.unwrap_or(item.price_cents),
    }
}

pub fn price_lines(cart: &[CartLine], items: &HashMap<Uuid, MenuItemRow>) -> AppResult<Vec<PricedLine>> {
    if cart.is_empty() {
        return Err(AppError::validation("cart is required"));
    }
    cart.iter()
        .map(|line| {
            if line.quantity <= 0 {
                return Err(AppError::validation("quantity must be positive"));
            }
            if line.quantity > MAX_LINE_QUANTITY {
                return Err(AppError::validation(format!(
                    "quantity must be at most {MAX_LINE_QUANTITY}"
                )));
            }
            let item = items
                .get(&line.menu_item_id)
                .filter(|i| i.is_orderable())
                .ok_or(AppError::InvalidItem)?;
            Ok(PricedLine {
                menu_item_id: item.id,
                name: item.name.clone(),
                variant: line.variant,
                quantity: line.quantity,
                unit_price_cents: unit_price(item, line.variant),
            })
        })
        .collect()
}

fn out_of_range() -> AppError {
    AppError::validation("Order total is out of range")
}

pub fn subtotal(lines: &[PricedLine]) -> AppResult<i64> {
    lines.iter().try_fold(0i64, |acc, line| {
        line.line_total()
            .and_then(|t| acc.checked_add(t))
            .ok_or_else(out_of_range)
    })
}

/// Accepts a missing tip as zero; negative or oversized tips are refused.
pub fn validate_tip(tip_cents: Option<i64>) -> AppResult<i64> {
    match tip_cents.unwrap_or(0) {
        t if t < 0 => Err(AppError::validation("tipCents must not be negative")),
        t if t > MAX_TIP_CENTS => Err(AppError::validation(format!(
            "tipCents must be at most {}",
            format_cents(MAX_TIP_CENTS)
        ))),
        t => Ok(t),
    }
}

/// The tip is added after the discount and is never discounted.
pub fn compute_total(subtotal_cents: i64, discount_cents: i64, tip_cents: i64) -> AppResult<i64> {
    subtotal_cents
        .checked_sub(discount_cents)
        .and_then(|t| t.checked_add(tip_cents))
        .ok_or_else(out_of_range)
}

/// Percent terms floor; no discount exceeds the subtotal it applies to.
pub fn discount_amount(terms: CouponTerms, subtotal_cents: i64) -> i64 {
    let raw = match terms {
        CouponTerms::PercentOff(pct) => {
            let off = i128::from(subtotal_cents) * i128::from(pct) / 100;
            i64::try_from(off).unwrap_or(0)
        }
        CouponTerms::AmountOff(cents) => cents,
    };
    raw.clamp(0, subtotal_cents.max(0))
}

pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub fn format_cents(cents: i64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

/// Outcome of checking a code against a subtotal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCheck {
    pub valid: bool,
    pub discount_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<DiscountKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_code_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl DiscountCheck {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            discount_cents: 0,
            kind: None,
            reason: Some(reason.into()),
            promotion_code_id: None,
            code: None,
        }
    }
}

/// Rules that need no customer history. A `Ok` result for a newcomer code
/// still has to pass the prior-payment check.
pub fn evaluate_discount(
    discount: Option<&DiscountRow>,
    subtotal_cents: i64,
    email: Option<&str>,
    now: OffsetDateTime,
) -> Result<DiscountCheck, DiscountCheck> {
    let d = discount
        .filter(|d| d.active && !d.is_expired(now))
        .ok_or_else(|| DiscountCheck::rejected(INVALID_CODE))?;
    let (kind, terms) = match (d.kind(), d.terms()) {
        (Ok(kind), Ok(terms)) => (kind, terms),
        _ => return Err(DiscountCheck::rejected(INVALID_CODE)),
    };
    if let Some(min) = d.min_subtotal_cents.filter(|min| subtotal_cents < *min) {
        return Err(DiscountCheck::rejected(format!(
            "Minimum order amount is {}",
            format_cents(min)
        )));
    }
    if kind == DiscountKind::Newcomer && email.map_or(true, |e| e.trim().is_empty()) {
        return Err(DiscountCheck::rejected(NEWCOMER_NEEDS_EMAIL));
    }
    Ok(DiscountCheck {
        valid: true,
        discount_cents: discount_amount(terms, subtotal_cents),
        kind: Some(kind),
        reason: None,
        promotion_code_id: d.promotion_code_id.clone(),
        code: Some(d.code.clone()),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use time::Duration;

    pub fn discount(code: &str, kind: DiscountKind) -> DiscountRow {
        DiscountRow {
            id: Uuid::new_v4(),
            code: code.into(),
            active: true,
            kind: kind.as_str().into(),
            percent_off: (kind == DiscountKind::Percent).then_some(20),
            amount_off_cents: (kind != DiscountKind::Percent).then_some(500),
            min_subtotal_cents: None,
            expires_at: None,
            show_banner: false,
            banner_message: String::new(),
            provider_coupon_id: Some("co_1".into()),
            promotion_code_id: Some(format!("promo_{}", code.to_lowercase())),
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn menu_item(price: i64, half: Option<i64>) -> MenuItemRow {
        MenuItemRow {
            id: Uuid::new_v4(),
            name: "Sourdough".into(),
            description: None,
            ingredients: vec![],
            price_cents: price,
            half_price_cents: half,
            has_half_order: half.is_some(),
            active: true,
            deleted: false,
            available_days: vec![],
            image_url: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn cart_prices_variants() {
        let loaf = menu_item(1000, Some(600));
        let bun = menu_item(300, None);
        let items: HashMap<_, _> = [(loaf.id, loaf.clone()), (bun.id, bun.clone())].into();
        let cart = [
            CartLine { menu_item_id: loaf.id, variant: Variant::Full, quantity: 1 },
            CartLine { menu_item_id: loaf.id, variant: Variant::Half, quantity: 2 },
            CartLine { menu_item_id: bun.id, variant: Variant::Half, quantity: 1 },
        ];
        let lines = price_lines(&cart, &items).unwrap();
        assert_eq!(subtotal(&lines).unwrap(), 1000 + 1200 + 300);
    }

    #[test]
    fn unknown_or_deleted_items_are_invalid() {
        let mut gone = menu_item(1000, None);
        gone.deleted = true;
        let items: HashMap<_, _> = [(gone.id, gone.clone())].into();
        let cart = [CartLine { menu_item_id: gone.id, variant: Variant::Full, quantity: 1 }];
        assert!(matches!(price_lines(&cart, &items), Err(AppError::InvalidItem)));
        let cart = [CartLine { menu_item_id: Uuid::new_v4(), variant: Variant::Full, quantity: 1 }];
        assert!(matches!(price_lines(&cart, &items), Err(AppError::InvalidItem)));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let loaf = menu_item(1000, None);
        let items: HashMap<_, _> = [(loaf.id, loaf.clone())].into();
        let cart = [CartLine { menu_item_id: loaf.id, variant: Variant::Full, quantity: 0 }];
        assert!(matches!(price_lines(&cart, &items), Err(AppError::Validation(_))));
    }

    #[test]
    fn percent_floors_and_fixed_caps() {
        assert_eq!(discount_amount(CouponTerms::PercentOff(15), 999), 149);
        assert_eq!(discount_amount(CouponTerms::AmountOff(500), 3000), 500);
        assert_eq!(discount_amount(CouponTerms::AmountOff(500), 300), 300);
        assert_eq!(compute_total(3000, 500, 200).unwrap(), 2700);
    }

    #[test]
    fn tips_are_bounded() {
        assert_eq!(validate_tip(None).unwrap(), 0);
        assert_eq!(validate_tip(Some(MAX_TIP_CENTS)).unwrap(), MAX_TIP_CENTS);
        assert!(matches!(validate_tip(Some(-1)), Err(AppError::Validation(_))));
        assert!(matches!(validate_tip(Some(MAX_TIP_CENTS + 1)), Err(AppError::Validation(_))));
        assert!(matches!(validate_tip(Some(i64::MAX)), Err(AppError::Validation(_))));
    }

    #[test]
    fn totals_refuse_to_overflow() {
        assert!(matches!(compute_total(1000, 0, i64::MAX), Err(AppError::Validation(_))));
        assert!(matches!(compute_total(i64::MIN, 1, 0), Err(AppError::Validation(_))));
    }

    #[test]
    fn huge_quantities_are_refused() {
        let loaf = menu_item(i64::MAX / 2, None);
        let items: HashMap<_, _> = [(loaf.id, loaf.clone())].into();
        let cart = [CartLine { menu_item_id: loaf.id, variant: Variant::Full, quantity: 1000 }];
        assert!(matches!(price_lines(&cart, &items), Err(AppError::Validation(_))));
        let cart = [CartLine { menu_item_id: loaf.id, variant: Variant::Full, quantity: 3 }];
        let lines = price_lines(&cart, &items).unwrap();
        assert!(matches!(subtotal(&lines), Err(AppError::Validation(_))));
    }

    #[test]
    fn minimum_subtotal_reason_is_formatted() {
        let mut d = discount("SAVE5", DiscountKind::Fixed);
        d.min_subtotal_cents = Some(2500);
        let err = evaluate_discount(Some(&d), 2000, None, OffsetDateTime::now_utc()).unwrap_err();
        assert!(!err.valid);
        assert_eq!(err.reason.as_deref(), Some("Minimum order amount is $25.00"));
        assert!(evaluate_discount(Some(&d), 2500, None, OffsetDateTime::now_utc()).is_ok());
    }

    #[test]
    fn expired_inactive_and_unknown_codes_are_invalid() {
        let now = OffsetDateTime::now_utc();
        let mut expired = discount("OLD", DiscountKind::Percent);
        expired.expires_at = Some(now - Duration::hours(1));
        let mut archived = discount("PAUSED", DiscountKind::Percent);
        archived.active = false;
        for d in [Some(&expired), Some(&archived), None] {
            let err = evaluate_discount(d, 5000, None, now).unwrap_err();
            assert_eq!(err.reason.as_deref(), Some(INVALID_CODE));
        }
    }

    #[test]
    fn percent_code_quotes_floor_of_subtotal() {
        let d = discount("SAVE20", DiscountKind::Percent);
        let ok = evaluate_discount(Some(&d), 1999, None, OffsetDateTime::now_utc()).unwrap();
        assert_eq!(ok.discount_cents, 399);
        assert_eq!(ok.kind, Some(DiscountKind::Percent));
        assert_eq!(ok.promotion_code_id.as_deref(), Some("promo_save20"));
    }

    #[test]
    fn newcomer_without_email_is_rejected() {
        let d = discount("WELCOME10", DiscountKind::Newcomer);
        let err = evaluate_discount(Some(&d), 1000, Some("  "), OffsetDateTime::now_utc()).unwrap_err();
        assert_eq!(err.reason.as_deref(), Some(NEWCOMER_NEEDS_EMAIL));
    }

    #[test]
    fn codes_normalize_case_and_whitespace() {
        assert_eq!(normalize_code(" save20 "), "SAVE20");
        assert_eq!(normalize_code("save20"), normalize_code("SAVE20"));
        assert_eq!(format_cents(1205), "$12.05");
    }
}
