use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{MenuItemFields, MenuItemRow};

const COLUMNS: &str = "id, name, description, ingredients, price_cents, half_price_cents, \
                       has_half_order, active, deleted, available_days, image_url, created_at";

pub async fn list_active(db: &PgPool) -> anyhow::Result<Vec<MenuItemRow>> {
    let rows = sqlx::query_as::<_, MenuItemRow>(&format!(
        "SELECT {COLUMNS} FROM menu_items WHERE active AND NOT deleted ORDER BY name ASC"
    ))
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn list_not_deleted(db: &PgPool) -> anyhow::Result<Vec<MenuItemRow>> {
    let rows = sqlx::query_as::<_, MenuItemRow>(&format!(
        "SELECT {COLUMNS} FROM menu_items WHERE NOT deleted ORDER BY name ASC"
    ))
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<MenuItemRow>> {
    let row = sqlx::query_as::<_, MenuItemRow>(&format!(
        "SELECT {COLUMNS} FROM menu_items WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Rows for the given ids, including soft-deleted ones.
pub async fn find_many(db: &PgPool, ids: &[Uuid]) -> anyhow::Result<Vec<MenuItemRow>> {
    let rows = sqlx::query_as::<_, MenuItemRow>(&format!(
        "SELECT {COLUMNS} FROM menu_items WHERE id = ANY($1)"
    ))
    .bind(ids)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn insert(db: &PgPool, id: Uuid, f: &MenuItemFields) -> anyhow::Result<MenuItemRow> {
    let row = sqlx::query_as::<_, MenuItemRow>(&format!(
        r#"
        INSERT INTO menu_items
            (id, name, description, ingredients, price_cents, half_price_cents,
             has_half_order, active, available_days)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&f.name)
    .bind(&f.description)
    .bind(&f.ingredients)
    .bind(f.price_cents)
    .bind(f.half_price_cents)
    .bind(f.has_half_order)
    .bind(f.active)
    .bind(&f.available_days)
    .fetch_one(db)
    .await?;
    Ok(row)
}

pub async fn update(db: &PgPool, id: Uuid, f: &MenuItemFields) -> anyhow::Result<Option<MenuItemRow>> {
    let row = sqlx::query_as::<_, MenuItemRow>(&format!(
        r#"
        UPDATE menu_items
           SET name = $2, description = $3, ingredients = $4, price_cents = $5,
               half_price_cents = $6, has_half_order = $7, active = $8,
               available_days = $9, updated_at = now()
         WHERE id = $1 AND NOT deleted
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&f.name)
    .bind(&f.description)
    .bind(&f.ingredients)
    .bind(f.price_cents)
    .bind(f.half_price_cents)
    .bind(f.has_half_order)
    .bind(f.active)
    .bind(&f.available_days)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn soft_delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"
        UPDATE menu_items
           SET deleted = TRUE, active = FALSE, updated_at = now()
         WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(db)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn set_image_url(db: &PgPool, id: Uuid, url: &str) -> anyhow::Result<Option<MenuItemRow>> {
    let row = sqlx::query_as::<_, MenuItemRow>(&format!(
        r#"
        UPDATE menu_items
           SET image_url = $2, updated_at = now()
         WHERE id = $1 AND NOT deleted
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(url)
    .fetch_optional(db)
    .await?;
    Ok(row)
}
