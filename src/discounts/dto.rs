use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{DiscountKind, DiscountRow};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDiscountRequest {
    pub code: Option<String>,
    #[serde(alias = "type")]
    pub kind: Option<DiscountKind>,
    pub percent_off: Option<i32>,
    pub amount_off_cents: Option<i64>,
    pub min_subtotal_cents: Option<i64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub show_banner: bool,
    pub banner_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDiscountRequest {
    pub active: Option<bool>,
    pub show_banner: Option<bool>,
    pub banner_message: Option<String>,
    /// Present only to be refused; expiry is fixed at creation.
    pub expires_at: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountDto {
    pub id: Uuid,
    pub code: String,
    pub active: bool,
    pub kind: String,
    pub percent_off: Option<i32>,
    pub amount_off_cents: Option<i64>,
    pub min_subtotal_cents: Option<i64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    pub expired: bool,
    pub show_banner: bool,
    pub banner_message: String,
    pub promotion_code_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl DiscountDto {
    pub fn new(r: DiscountRow, now: OffsetDateTime) -> Self {
        Self {
            expired: r.is_expired(now),
            id: r.id,
            code: r.code,
            active: r.active,
            kind: r.kind,
            percent_off: r.percent_off,
            amount_off_cents: r.amount_off_cents,
            min_subtotal_cents: r.min_subtotal_cents,
            expires_at: r.expires_at,
            show_banner: r.show_banner,
            banner_message: r.banner_message,
            promotion_code_id: r.promotion_code_id,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DiscountsResponse {
    pub discounts: Vec<DiscountDto>,
}

#[derive(Debug, Serialize)]
pub struct DiscountResponse {
    pub success: bool,
    pub discount: DiscountDto,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerDto {
    pub id: Uuid,
    pub code: String,
    pub banner_message: String,
}

#[derive(Debug, Serialize)]
pub struct BannersResponse {
    pub banners: Vec<BannerDto>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_accepts_type_alias_and_rfc3339_expiry() {
        let req: CreateDiscountRequest = serde_json::from_value(serde_json::json!({
            "code": "save20",
            "type": "percent",
            "percentOff": 20,
            "expiresAt": "2026-12-31T23:59:59Z"
        }))
        .unwrap();
        assert_eq!(req.kind, Some(DiscountKind::Percent));
        assert!(req.expires_at.is_some());
        assert!(!req.show_banner);
    }
}
