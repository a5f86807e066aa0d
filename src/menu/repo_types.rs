use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct MenuItemRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub ingredients: Vec<String>,
    pub price_cents: i64,
    pub half_price_cents: Option<i64>,
    pub has_half_order: bool,
    pub active: bool,
    pub deleted: bool,
    pub available_days: Vec<String>,
    pub image_url: Option<String>,
    pub created_at: OffsetDateTime,
}

impl MenuItemRow {
    /// Listed for customers at all.
    pub fn is_orderable(&self) -> bool {
        self.active && !self.deleted
    }

    pub fn offered_on(&self, weekday: &str) -> bool {
        self.is_orderable() && self.available_days.iter().any(|d| d.eq_ignore_ascii_case(weekday))
    }
}

/// Column values written by insert and update.
#[derive(Debug, Clone)]
pub struct MenuItemFields {
    pub name: String,
    pub description: Option<String>,
    pub ingredients: Vec<String>,
    pub price_cents: i64,
    pub half_price_cents: Option<i64>,
    pub has_half_order: bool,
    pub active: bool,
    pub available_days: Vec<String>,
}

impl From<&MenuItemRow> for MenuItemFields {
    fn from(r: &MenuItemRow) -> Self {
        Self {
            name: r.name.clone(),
            description: r.description.clone(),
            ingredients: r.ingredients.clone(),
            price_cents: r.price_cents,
            half_price_cents: r.half_price_cents,
            has_half_order: r.has_half_order,
            active: r.active,
            available_days: r.available_days.clone(),
        }
    }
}
