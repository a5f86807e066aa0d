use sqlx::PgPool;
use time::Date;
use tracing::info;
use uuid::Uuid;

use super::{
    dto::{CreateMenuItemRequest, UpdateMenuItemRequest},
    repo,
    repo_types::{MenuItemFields, MenuItemRow},
};
use crate::{
    availability::{self, services::DayAvailability},
    calendar::{self, WEEKDAY_NAMES},
    error::{AppError, AppResult},
};

pub async fn list_active_items(db: &PgPool) -> AppResult<Vec<MenuItemRow>> {
    Ok(repo::list_active(db).await?)
}

/// Items a customer can pick up on `date`; empty whenever the day is closed.
pub async fn list_items_for_date(db: &PgPool, date: Date) -> AppResult<Vec<MenuItemRow>> {
    let day = availability::services::get_availability(db, date).await?;
    let items = if day.is_open() {
        repo::list_active(db).await?
    } else {
        Vec::new()
    };
    Ok(items_for_day(&day, items, date))
}

/// A closed day offers nothing, whatever the items' own flags say.
pub fn items_for_day(day: &DayAvailability, items: Vec<MenuItemRow>, date: Date) -> Vec<MenuItemRow> {
    if !day.is_open() {
        return Vec::new();
    }
    filter_for_weekday(items, calendar::weekday_name(date))
}

pub async fn list_admin_items(db: &PgPool) -> AppResult<Vec<MenuItemRow>> {
    Ok(repo::list_not_deleted(db).await?)
}

pub async fn create_item(db: &PgPool, req: CreateMenuItemRequest) -> AppResult<MenuItemRow> {
    let name = req
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::validation("name is required"))?;
    let price_cents = req.price.ok_or_else(|| AppError::validation("price is required"))?;

    let fields = MenuItemFields {
        name,
        description: req.description.filter(|d| !d.trim().is_empty()),
        ingredients: clean_ingredients(req.ingredients),
        price_cents,
        half_price_cents: req.half_price,
        has_half_order: req.has_half_order,
        active: req.active.unwrap_or(true),
        available_days: normalize_days(&req.available_days)?,
    };
    check_prices(&fields)?;

    let row = repo::insert(db, Uuid::new_v4(), &fields).await?;
    info!(item_id = %row.id, name = %row.name, "menu item created");
    Ok(row)
}

pub async fn update_item(db: &PgPool, id: Uuid, req: UpdateMenuItemRequest) -> AppResult<MenuItemRow> {
    let current = repo::find_by_id(db, id)
        .await?
        .filter(|r| !r.deleted)
        .ok_or(AppError::NotFound("Menu item"))?;
    let fields = apply_update(MenuItemFields::from(&current), req)?;
    let row = repo::update(db, id, &fields)
        .await?
        .ok_or(AppError::NotFound("Menu item"))?;
    info!(item_id = %id, "menu item updated");
    Ok(row)
}

pub async fn soft_delete_item(db: &PgPool, id: Uuid) -> AppResult<()> {
    if !repo::soft_delete(db, id).await? {
        return Err(AppError::NotFound("Menu item"));
    }
    info!(item_id = %id, "menu item soft-deleted");
    Ok(())
}

fn filter_for_weekday(items: Vec<MenuItemRow>, weekday: &str) -> Vec<MenuItemRow> {
    items.into_iter().filter(|i| i.offered_on(weekday)).collect()
}

fn apply_update(mut f: MenuItemFields, req: UpdateMenuItemRequest) -> AppResult<MenuItemFields> {
    if let Some(name) = req.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("name must not be empty"));
        }
        f.name = name;
    }
    if let Some(description) = req.description {
        f.description = Some(description).filter(|d| !d.trim().is_empty());
    }
    if let Some(ingredients) = req.ingredients {
        f.ingredients = clean_ingredients(ingredients);
    }
    if let Some(price) = req.price {
        f.price_cents = price;
    }
    if let Some(half) = req.half_price {
        f.half_price_cents = Some(half);
    }
    if let Some(has_half) = req.has_half_order {
        f.has_half_order = has_half;
    }
    if let Some(active) = req.active {
        f.active = active;
    }
    if let Some(days) = req.available_days {
        f.available_days = normalize_days(&days)?;
    }
    check_prices(&f)?;
    Ok(f)
}

fn check_prices(f: &MenuItemFields) -> AppResult<()> {
    if f.price_cents < 0 {
        return Err(AppError::validation("price must not be negative"));
    }
    match f.half_price_cents {
        Some(half) if half < 0 => Err(AppError::validation("halfPrice must not be negative")),
        None if f.has_half_order => Err(AppError::validation(
            "halfPrice is required when hasHalfOrder is set",
        )),
        _ => Ok(()),
    }
}

fn clean_ingredients(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect()
}

/// Canonical weekday names in week order, rejecting anything unknown.
fn normalize_days<S: AsRef<str>>(raw: &[S]) -> AppResult<Vec<String>> {
    let mut picked = [false; 7];
    for day in raw {
        let day = day.as_ref().trim();
        let idx = WEEKDAY_NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(day))
            .ok_or_else(|| AppError::validation(format!("Unknown weekday: {day}")))?;
        picked[idx] = true;
    }
    Ok(WEEKDAY_NAMES
        .iter()
        .zip(picked)
        .filter(|(_, on)| *on)
        .map(|(name, _)| name.to_string())
        .collect())
}
