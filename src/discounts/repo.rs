use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{DiscountRow, NewDiscount};

const COLUMNS: &str = "id, code, active, kind, percent_off, amount_off_cents, min_subtotal_cents, \
                       expires_at, show_banner, banner_message, provider_coupon_id, \
                       promotion_code_id, created_at";

pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<DiscountRow>> {
    let rows = sqlx::query_as::<_, DiscountRow>(&format!(
        "SELECT {COLUMNS} FROM discounts ORDER BY created_at DESC"
    ))
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<DiscountRow>> {
    let row = sqlx::query_as::<_, DiscountRow>(&format!(
        "SELECT {COLUMNS} FROM discounts WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Codes are stored upper-cased; callers pass a normalized code.
pub async fn find_by_code(db: &PgPool, code: &str) -> anyhow::Result<Option<DiscountRow>> {
    let row = sqlx::query_as::<_, DiscountRow>(&format!(
        "SELECT {COLUMNS} FROM discounts WHERE code = $1"
    ))
    .bind(code)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn code_exists(db: &PgPool, code: &str) -> anyhow::Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM discounts WHERE code = $1)")
        .bind(code)
        .fetch_one(db)
        .await?;
    Ok(exists)
}

pub async fn list_banners(db: &PgPool, now: OffsetDateTime) -> anyhow::Result<Vec<DiscountRow>> {
    let rows = sqlx::query_as::<_, DiscountRow>(&format!(
        r#"
        SELECT {COLUMNS}
          FROM discounts
         WHERE active
           AND show_banner
           AND btrim(banner_message) <> ''
           AND (expires_at IS NULL OR expires_at > $1)
         ORDER BY created_at DESC
        "#
    ))
    .bind(now)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn insert(db: &PgPool, d: &NewDiscount) -> Result<DiscountRow, sqlx::Error> {
    sqlx::query_as::<_, DiscountRow>(&format!(
        r#"
        INSERT INTO discounts
            (id, code, active, kind, percent_off, amount_off_cents, min_subtotal_cents,
             expires_at, show_banner, banner_message, provider_coupon_id, promotion_code_id)
        VALUES ($1, $2, TRUE, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(d.id)
    .bind(&d.code)
    .bind(d.kind.as_str())
    .bind(d.percent_off)
    .bind(d.amount_off_cents)
    .bind(d.min_subtotal_cents)
    .bind(d.expires_at)
    .bind(d.show_banner)
    .bind(&d.banner_message)
    .bind(&d.provider_coupon_id)
    .bind(&d.promotion_code_id)
    .fetch_one(db)
    .await
}

pub async fn set_active(db: &PgPool, id: Uuid, active: bool) -> anyhow::Result<Option<DiscountRow>> {
    let row = sqlx::query_as::<_, DiscountRow>(&format!(
        "UPDATE discounts SET active = $2 WHERE id = $1 RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(active)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn set_banner(
    db: &PgPool,
    id: Uuid,
    show_banner: bool,
    banner_message: &str,
) -> anyhow::Result<Option<DiscountRow>> {
    let row = sqlx::query_as::<_, DiscountRow>(&format!(
        r#"
        UPDATE discounts
           SET show_banner = $2, banner_message = $3
         WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(show_banner)
    .bind(banner_message)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Deletes only archived discounts.
pub async fn delete_archived(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM discounts WHERE id = $1 AND NOT active")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
