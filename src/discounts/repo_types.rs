use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::payments::CouponTerms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    Percent,
    Fixed,
    Newcomer,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percent => "percent",
            DiscountKind::Fixed => "fixed",
            DiscountKind::Newcomer => "newcomer",
        }
    }
}

impl fmt::Display for DiscountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percent" => Ok(DiscountKind::Percent),
            "fixed" => Ok(DiscountKind::Fixed),
            "newcomer" => Ok(DiscountKind::Newcomer),
            other => anyhow::bail!("unknown discount kind {other}"),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DiscountRow {
    pub id: Uuid,
    pub code: String,
    pub active: bool,
    pub kind: String,
    pub percent_off: Option<i32>,
    pub amount_off_cents: Option<i64>,
    pub min_subtotal_cents: Option<i64>,
    pub expires_at: Option<OffsetDateTime>,
    pub show_banner: bool,
    pub banner_message: String,
    pub provider_coupon_id: Option<String>,
    pub promotion_code_id: Option<String>,
    pub created_at: OffsetDateTime,
}

impl DiscountRow {
    pub fn kind(&self) -> anyhow::Result<DiscountKind> {
        self.kind.parse()
    }

    /// Coupon terms implied by the kind and its amount columns.
    pub fn terms(&self) -> anyhow::Result<CouponTerms> {
        match (self.kind()?, self.percent_off, self.amount_off_cents) {
            (DiscountKind::Percent, Some(pct), _) => Ok(CouponTerms::PercentOff(pct)),
            (DiscountKind::Fixed | DiscountKind::Newcomer, _, Some(cents)) => {
                Ok(CouponTerms::AmountOff(cents))
            }
            (kind, _, _) => anyhow::bail!("discount {} ({kind}) has no amount", self.code),
        }
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Column values written when a discount is created.
#[derive(Debug, Clone)]
pub struct NewDiscount {
    pub id: Uuid,
    pub code: String,
    pub kind: DiscountKind,
    pub percent_off: Option<i32>,
    pub amount_off_cents: Option<i64>,
    pub min_subtotal_cents: Option<i64>,
    pub expires_at: Option<OffsetDateTime>,
    pub show_banner: bool,
    pub banner_message: String,
    pub provider_coupon_id: String,
    pub promotion_code_id: String,
}
