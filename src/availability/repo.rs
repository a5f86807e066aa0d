use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::Date;

#[derive(Debug, Clone, FromRow)]
pub struct AvailabilityRow {
    pub date: Date,
    pub time_slots: Vec<String>,
}

pub async fn find_by_date(db: &PgPool, date: Date) -> anyhow::Result<Option<AvailabilityRow>> {
    let row = sqlx::query_as::<_, AvailabilityRow>(
        r#"
        SELECT date, time_slots
          FROM availability
         WHERE date = $1
        "#,
    )
    .bind(date)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn list_between(db: &PgPool, start: Date, end: Date) -> anyhow::Result<Vec<AvailabilityRow>> {
    let rows = sqlx::query_as::<_, AvailabilityRow>(
        r#"
        SELECT date, time_slots
          FROM availability
         WHERE date BETWEEN $1 AND $2
         ORDER BY date ASC
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn upsert(db: &PgPool, date: Date, slots: &[String]) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO availability (date, time_slots)
        VALUES ($1, $2)
        ON CONFLICT (date)
        DO UPDATE SET time_slots = EXCLUDED.time_slots, updated_at = now()
        "#,
    )
    .bind(date)
    .bind(slots)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn delete(db: &PgPool, date: Date) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM availability WHERE date = $1")
        .bind(date)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Day records the availability service reads and writes.
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    async fn find_by_date(&self, date: Date) -> anyhow::Result<Option<AvailabilityRow>>;
    async fn list_between(&self, start: Date, end: Date) -> anyhow::Result<Vec<AvailabilityRow>>;
    async fn upsert(&self, date: Date, slots: &[String]) -> anyhow::Result<()>;
    async fn delete(&self, date: Date) -> anyhow::Result<bool>;
}

#[async_trait]
impl AvailabilityStore for PgPool {
    async fn find_by_date(&self, date: Date) -> anyhow::Result<Option<AvailabilityRow>> {
        find_by_date(self, date).await
    }

    async fn list_between(&self, start: Date, end: Date) -> anyhow::Result<Vec<AvailabilityRow>> {
        list_between(self, start, end).await
    }

    async fn upsert(&self, date: Date, slots: &[String]) -> anyhow::Result<()> {
        upsert(self, date, slots).await
    }

    async fn delete(&self, date: Date) -> anyhow::Result<bool> {
        delete(self, date).await
    }
}
