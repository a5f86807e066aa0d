use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::MenuItemRow;

#[derive(Debug, Deserialize)]
pub struct MenuQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemDto {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub ingredients: Vec<String>,
    /// Full-portion price in cents.
    pub price: i64,
    pub half_price: Option<i64>,
    pub has_half_order: bool,
    pub active: bool,
    pub available_days: Vec<String>,
    pub image_url: Option<String>,
}

impl From<MenuItemRow> for MenuItemDto {
    fn from(r: MenuItemRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            ingredients: r.ingredients,
            price: r.price_cents,
            half_price: r.half_price_cents,
            has_half_order: r.has_half_order,
            active: r.active,
            available_days: r.available_days,
            image_url: r.image_url,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMenuItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    pub price: Option<i64>,
    pub half_price: Option<i64>,
    #[serde(default)]
    pub has_half_order: bool,
    pub active: Option<bool>,
    #[serde(default)]
    pub available_days: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMenuItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub ingredients: Option<Vec<String>>,
    pub price: Option<i64>,
    pub half_price: Option<i64>,
    pub has_half_order: Option<bool>,
    pub active: Option<bool>,
    pub available_days: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
}
