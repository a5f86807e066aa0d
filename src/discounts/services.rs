use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{CreateDiscountRequest, UpdateDiscountRequest},
    repo,
    repo_types::{DiscountKind, DiscountRow, NewDiscount},
};
use crate::{
    error::{AppError, AppResult},
    payments::{CouponTerms, PaymentGateway, PromotionSpec},
    pricing::rules::normalize_code,
};

pub fn is_valid_code(code: &str) -> bool {
    lazy_static! {
        static ref CODE_RE: Regex = Regex::new(r"^[A-Z0-9_-]{3,32}$").unwrap();
    }
    CODE_RE.is_match(code)
}

/// Checked creation input, ready to mirror at the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountDraft {
    pub code: String,
    pub kind: DiscountKind,
    pub terms: CouponTerms,
    pub min_subtotal_cents: Option<i64>,
    pub expires_at: Option<OffsetDateTime>,
    pub show_banner: bool,
    pub banner_message: String,
}

impl DiscountDraft {
    fn promotion_spec(&self) -> PromotionSpec {
        PromotionSpec {
            code: self.code.clone(),
            kind: self.kind.as_str(),
            terms: self.terms,
            min_subtotal_cents: self.min_subtotal_cents,
            expires_at: self.expires_at,
        }
    }
}

pub fn draft_from_request(req: CreateDiscountRequest, now: OffsetDateTime) -> AppResult<DiscountDraft> {
    let code = req.code.as_deref().map(normalize_code).unwrap_or_default();
    if code.is_empty() {
        return Err(AppError::validation("code is required"));
    }
    if !is_valid_code(&code) {
        return Err(AppError::validation(
            "code must be 3-32 letters, digits, '-' or '_'",
        ));
    }
    let kind = req.kind.ok_or_else(|| AppError::validation("type is required"))?;
    let terms = match kind {
        DiscountKind::Percent => {
            let pct = req
                .percent_off
                .ok_or_else(|| AppError::validation("percentOff is required for percent discounts"))?;
            if !(1..=100).contains(&pct) {
                return Err(AppError::validation("percentOff must be between 1 and 100"));
            }
            CouponTerms::PercentOff(pct)
        }
        DiscountKind::Fixed | DiscountKind::Newcomer => {
            let cents = req.amount_off_cents.ok_or_else(|| {
                AppError::validation(format!("amountOffCents is required for {kind} discounts"))
            })?;
            if cents <= 0 {
                return Err(AppError::validation("amountOffCents must be positive"));
            }
            CouponTerms::AmountOff(cents)
        }
    };
    if kind == DiscountKind::Fixed && req.min_subtotal_cents.is_none() {
        return Err(AppError::validation(
            "minSubtotalCents is required for fixed discounts",
        ));
    }
    if req.min_subtotal_cents.is_some_and(|m| m < 0) {
        return Err(AppError::validation("minSubtotalCents must not be negative"));
    }
    if req.expires_at.is_some_and(|at| at <= now) {
        return Err(AppError::validation("expiresAt must be in the future"));
    }
    Ok(DiscountDraft {
        code,
        kind,
        terms,
        min_subtotal_cents: req.min_subtotal_cents,
        expires_at: req.expires_at,
        show_banner: req.show_banner,
        banner_message: req.banner_message.unwrap_or_default().trim().to_string(),
    })
}

pub async fn list_discounts(db: &PgPool) -> AppResult<Vec<DiscountRow>> {
    Ok(repo::list_all(db).await?)
}

pub async fn get_discount(db: &PgPool, id: Uuid) -> AppResult<DiscountRow> {
    repo::find_by_id(db, id).await?.ok_or(AppError::NotFound("Discount"))
}

/// Mirrors the discount at the provider, then stores it locally.
pub async fn create_discount(
    db: &PgPool,
    payments: &dyn PaymentGateway,
    req: CreateDiscountRequest,
    now: OffsetDateTime,
) -> AppResult<DiscountRow> {
    let draft = draft_from_request(req, now)?;
    if repo::code_exists(db, &draft.code).await? {
        return Err(AppError::conflict("Discount code already exists"));
    }

    let promotion = payments
        .create_promotion(&draft.promotion_spec())
        .await
        .map_err(AppError::Upstream)?;

    let (percent_off, amount_off_cents) = match draft.terms {
        CouponTerms::PercentOff(pct) => (Some(pct), None),
        CouponTerms::AmountOff(cents) => (None, Some(cents)),
    };
    let new = NewDiscount {
        id: Uuid::new_v4(),
        code: draft.code.clone(),
        kind: draft.kind,
        percent_off,
        amount_off_cents,
        min_subtotal_cents: draft.min_subtotal_cents,
        expires_at: draft.expires_at,
        show_banner: draft.show_banner,
        banner_message: draft.banner_message.clone(),
        provider_coupon_id: promotion.coupon_id.clone(),
        promotion_code_id: promotion.promotion_code_id.clone(),
    };
    match repo::insert(db, &new).await {
        Ok(row) => {
            info!(discount_id = %row.id, code = %row.code, kind = %draft.kind, "discount created");
            Ok(row)
        }
        Err(e) => {
            if let Err(cleanup) = payments.delete_coupon(&promotion.coupon_id).await {
                warn!(error = %format!("{cleanup:#}"), coupon = %promotion.coupon_id, "orphaned provider coupon");
            }
            match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    Err(AppError::conflict("Discount code already exists"))
                }
                other => Err(other.into()),
            }
        }
    }
}

async fn mirror_active(payments: &dyn PaymentGateway, row: &DiscountRow, active: bool) -> AppResult<()> {
    if let Some(promo) = row.promotion_code_id.as_deref() {
        payments
            .set_promotion_active(promo, active)
            .await
            .map_err(AppError::Upstream)?;
    }
    Ok(())
}

/// Idempotent.
pub async fn archive_discount(db: &PgPool, payments: &dyn PaymentGateway, id: Uuid) -> AppResult<DiscountRow> {
    let row = get_discount(db, id).await?;
    if !row.active {
        return Ok(row);
    }
    mirror_active(payments, &row, false).await?;
    let row = repo::set_active(db, id, false).await?.ok_or(AppError::NotFound("Discount"))?;
    info!(discount_id = %id, code = %row.code, "discount archived");
    Ok(row)
}

pub async fn activate_discount(
    db: &PgPool,
    payments: &dyn PaymentGateway,
    id: Uuid,
    now: OffsetDateTime,
) -> AppResult<DiscountRow> {
    let row = get_discount(db, id).await?;
    check_transition(&row, Some(true), now)?;
    if row.active {
        return Ok(row);
    }
    mirror_active(payments, &row, true).await?;
    let row = repo::set_active(db, id, true).await?.ok_or(AppError::NotFound("Discount"))?;
    info!(discount_id = %id, code = %row.code, "discount reactivated");
    Ok(row)
}

/// Refuses an update whose `active` change cannot succeed, before anything is written.
fn check_transition(row: &DiscountRow, active: Option<bool>, now: OffsetDateTime) -> AppResult<()> {
    if active == Some(true) && row.is_expired(now) {
        return Err(AppError::conflict("Expired discounts cannot be reactivated"));
    }
    Ok(())
}

pub async fn update_discount(
    db: &PgPool,
    payments: &dyn PaymentGateway,
    id: Uuid,
    req: UpdateDiscountRequest,
    now: OffsetDateTime,
) -> AppResult<DiscountRow> {
    if req.expires_at.as_ref().is_some_and(|v| !v.is_null()) {
        return Err(AppError::validation("Expiry cannot be changed after creation"));
    }
    let mut row = get_discount(db, id).await?;
    check_transition(&row, req.active, now)?;
    if req.show_banner.is_some() || req.banner_message.is_some() {
        let show = req.show_banner.unwrap_or(row.show_banner);
        let message = req
            .banner_message
            .map(|m| m.trim().to_string())
            .unwrap_or_else(|| row.banner_message.clone());
        row = repo::set_banner(db, id, show, &message)
            .await?
            .ok_or(AppError::NotFound("Discount"))?;
    }
    match req.active {
        Some(true) => activate_discount(db, payments, id, now).await,
        Some(false) => archive_discount(db, payments, id).await,
        None => Ok(row),
    }
}

/// Permanent removal; only archived discounts qualify.
pub async fn delete_discount(db: &PgPool, payments: &dyn PaymentGateway, id: Uuid) -> AppResult<()> {
    let row = get_discount(db, id).await?;
    if row.active {
        return Err(AppError::conflict("Archive the discount before deleting it"));
    }
    if !repo::delete_archived(db, id).await? {
        return Err(AppError::conflict("Archive the discount before deleting it"));
    }
    if let Some(coupon) = row.provider_coupon_id.as_deref() {
        if let Err(e) = payments.delete_coupon(coupon).await {
            warn!(error = %format!("{e:#}"), %coupon, "provider coupon left behind");
        }
    }
    info!(discount_id = %id, code = %row.code, "discount deleted");
    Ok(())
}

pub async fn list_banners(db: &PgPool, now: OffsetDateTime) -> AppResult<Vec<DiscountRow>> {
    Ok(repo::list_banners(db, now).await?)
}
