use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use time::Date;
use uuid::Uuid;

use super::repo_types::{DayCountRow, NewOrder, OrderItemRow, OrderRow, OrderStatus};
use crate::pricing::PricedLine;

const COLUMNS: &str = "id, customer_name, customer_email, pickup_date, pickup_time, notes, status, \
                       subtotal_cents, discount_cents, tip_cents, total_cents, discount_code, \
                       promotion_code_id, checkout_session_id, created_at, paid_at, fulfilled_at";

/// Which admin listing to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderFilter {
    Upcoming,
    Past,
    ForDate(Date),
}

pub async fn insert_order_tx(tx: &mut Transaction<'_, Postgres>, o: &NewOrder) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO orders
            (id, customer_name, customer_email, pickup_date, pickup_time, notes, status,
             subtotal_cents, discount_cents, tip_cents, total_cents, discount_code,
             promotion_code_id)
        VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(o.id)
    .bind(&o.customer_name)
    .bind(&o.customer_email)
    .bind(o.pickup_date)
    .bind(&o.pickup_time)
    .bind(&o.notes)
    .bind(o.subtotal_cents)
    .bind(o.discount_cents)
    .bind(o.tip_cents)
    .bind(o.total_cents)
    .bind(&o.discount_code)
    .bind(&o.promotion_code_id)
    .execute(&mut **tx)
    .await
    .context("insert order")?;
    Ok(())
}

pub async fn insert_item_tx(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    line: &PricedLine,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (id, order_id, menu_item_id, quantity, variant, unit_price_cents)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(order_id)
    .bind(line.menu_item_id)
    .bind(line.quantity)
    .bind(line.variant.as_str())
    .bind(line.unit_price_cents)
    .execute(&mut **tx)
    .await
    .context("insert order item")?;
    Ok(())
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<OrderRow>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {COLUMNS} FROM orders WHERE id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find order")?;
    Ok(row)
}

/// Line items of the given orders, with the menu item's current name.
pub async fn items_for_orders(db: &PgPool, order_ids: &[Uuid]) -> anyhow::Result<Vec<OrderItemRow>> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        r#"
        SELECT oi.id, oi.order_id, oi.menu_item_id, m.name, oi.quantity, oi.variant,
               oi.unit_price_cents
          FROM order_items oi
          JOIN menu_items m ON m.id = oi.menu_item_id
         WHERE oi.order_id = ANY($1)
         ORDER BY m.name ASC, oi.variant ASC
        "#,
    )
    .bind(order_ids)
    .fetch_all(db)
    .await
    .context("list order items")?;
    Ok(rows)
}

impl OrderFilter {
    /// `(WHERE clause, ORDER BY, $1)` for this listing.
    fn query_parts(self, today: Date) -> (&'static str, &'static str, Date) {
        match self {
            OrderFilter::Upcoming => (
                "status = 'paid' AND pickup_date >= $1",
                "pickup_date ASC, pickup_time ASC",
                today,
            ),
            OrderFilter::Past => (
                "(status = 'fulfilled' OR pickup_date < $1)",
                "pickup_date DESC, pickup_time DESC",
                today,
            ),
            OrderFilter::ForDate(date) => ("pickup_date = $1", "pickup_date ASC, pickup_time ASC", date),
        }
    }
}

pub async fn list(db: &PgPool, filter: OrderFilter, today: Date) -> anyhow::Result<Vec<OrderRow>> {
    let (clause, order, day) = filter.query_parts(today);
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {COLUMNS} FROM orders WHERE {clause} ORDER BY {order}"
    ))
    .bind(day)
    .fetch_all(db)
    .await
    .context("list orders")?;
    Ok(rows)
}

/// Paid orders whose pickup day is not after `through`.
pub async fn paid_through(db: &PgPool, through: Date) -> anyhow::Result<Vec<OrderRow>> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {COLUMNS} FROM orders WHERE status = 'paid' AND pickup_date <= $1"
    ))
    .bind(through)
    .fetch_all(db)
    .await
    .context("list paid orders")?;
    Ok(rows)
}

/// Unconditional admin override; keeps the first fulfilment time.
pub async fn mark_fulfilled(db: &PgPool, id: Uuid) -> anyhow::Result<Option<OrderRow>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r#"
        UPDATE orders
           SET status = 'fulfilled', fulfilled_at = COALESCE(fulfilled_at, now())
         WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .fetch_optional(db)
    .await
    .context("mark order fulfilled")?;
    Ok(row)
}

/// Moves still-paid orders to fulfilled; rows already moved are skipped.
pub async fn fulfill_paid(db: &PgPool, ids: &[Uuid]) -> anyhow::Result<u64> {
    let res = sqlx::query(
        r#"
        UPDATE orders
           SET status = 'fulfilled', fulfilled_at = now()
         WHERE status = 'paid' AND id = ANY($1)
        "#,
    )
    .bind(ids)
    .execute(db)
    .await
    .context("auto-fulfil orders")?;
    Ok(res.rows_affected())
}

pub async fn delete_pending(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM orders WHERE id = $1 AND status = 'pending'")
        .bind(id)
        .execute(db)
        .await
        .context("delete pending order")?;
    Ok(res.rows_affected() > 0)
}

pub async fn set_tip(db: &PgPool, id: Uuid, tip_cents: i64) -> anyhow::Result<Option<OrderRow>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r#"
        UPDATE orders
           SET tip_cents = $2, total_cents = subtotal_cents - discount_cents + $2
         WHERE id = $1 AND status = 'pending'
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(tip_cents)
    .fetch_optional(db)
    .await
    .context("update order tip")?;
    Ok(row)
}

pub async fn set_checkout_session(db: &PgPool, id: Uuid, session_id: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE orders SET checkout_session_id = $2 WHERE id = $1")
        .bind(id)
        .bind(session_id)
        .execute(db)
        .await
        .context("store checkout session")?;
    Ok(())
}

/// Status written by a settlement. Decided in the UPDATE itself so a
/// concurrent admin fulfilment is never undone.
const SETTLED_STATUS: &str = "CASE WHEN status = 'fulfilled' THEN status ELSE $2 END";

/// Overwrites pricing with provider-confirmed values.
pub async fn apply_settlement(
    db: &PgPool,
    id: Uuid,
    status: OrderStatus,
    discount_cents: i64,
    total_cents: i64,
) -> anyhow::Result<Option<OrderRow>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r#"
        UPDATE orders
           SET status = {SETTLED_STATUS}, discount_cents = $3, total_cents = $4,
               paid_at = COALESCE(paid_at, now())
         WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(status.as_str())
    .bind(discount_cents)
    .bind(total_cents)
    .fetch_optional(db)
    .await
    .context("apply settlement")?;
    Ok(row)
}

/// Whether the e-mail already has a paid or fulfilled order.
pub async fn has_settled_order(db: &PgPool, email: &str) -> anyhow::Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM orders
             WHERE lower(customer_email) = lower($1)
               AND status IN ('paid', 'fulfilled')
        )
        "#,
    )
    .bind(email)
    .fetch_one(db)
    .await
    .context("check order history")?;
    Ok(exists)
}

pub async fn counts_between(db: &PgPool, start: Date, end: Date) -> anyhow::Result<Vec<DayCountRow>> {
    let rows = sqlx::query_as::<_, DayCountRow>(
        r#"
        SELECT pickup_date AS day, COUNT(*) AS order_count
          FROM orders
         WHERE pickup_date BETWEEN $1 AND $2
         GROUP BY pickup_date
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(db)
    .await
    .context("count orders per day")?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn upcoming_is_paid_from_today_ascending() {
        let today = date!(2026 - 10 - 17);
        let (clause, order, day) = OrderFilter::Upcoming.query_parts(today);
        assert_eq!(clause, "status = 'paid' AND pickup_date >= $1");
        assert_eq!(order, "pickup_date ASC, pickup_time ASC");
        assert_eq!(day, today);
    }

    #[test]
    fn past_includes_fulfilled_and_earlier_days_descending() {
        let today = date!(2026 - 10 - 17);
        let (clause, order, day) = OrderFilter::Past.query_parts(today);
        assert_eq!(clause, "(status = 'fulfilled' OR pickup_date < $1)");
        assert_eq!(order, "pickup_date DESC, pickup_time DESC");
        assert_eq!(day, today);
    }

    #[test]
    fn for_date_matches_the_exact_day() {
        let picked = date!(2026 - 10 - 24);
        let (clause, order, day) = OrderFilter::ForDate(picked).query_parts(date!(2026 - 10 - 17));
        assert_eq!(clause, "pickup_date = $1");
        assert_eq!(order, "pickup_date ASC, pickup_time ASC");
        assert_eq!(day, picked);
    }

    #[test]
    fn settlement_keeps_a_fulfilled_status() {
        assert!(SETTLED_STATUS.starts_with("CASE WHEN status = 'fulfilled' THEN status"));
        assert!(SETTLED_STATUS.ends_with("ELSE $2 END"));
    }
}
