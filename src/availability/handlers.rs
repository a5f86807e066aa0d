use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{AvailabilityResponse, DateQuery, RangeEntry, RangeQuery, SetAvailabilityRequest},
    services::{self, DayAvailability},
};
use crate::{
    auth::AdminUser,
    calendar,
    error::{AppError, AppResult},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/availability", get(get_availability).post(set_availability))
        .route("/availability-range", get(get_availability_range))
}

fn required_date(raw: Option<&str>, field: &str) -> AppResult<time::Date> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::validation(format!("{field} is required")))?;
    calendar::parse_date(raw)
}

#[instrument(skip(state))]
pub async fn get_availability(
    State(state): State<AppState>,
    Query(q): Query<DateQuery>,
) -> AppResult<Json<AvailabilityResponse>> {
    let date = required_date(q.date.as_deref(), "date")?;
    let day = services::get_availability(&state.db, date).await?;
    Ok(Json(day.into()))
}

#[instrument(skip(state))]
pub async fn get_availability_range(
    State(state): State<AppState>,
    Query(q): Query<RangeQuery>,
) -> AppResult<Json<Vec<RangeEntry>>> {
    let start = required_date(q.start.as_deref(), "start")?;
    let end = required_date(q.end.as_deref(), "end")?;
    let days = services::get_availability_range(&state.db, start, end).await?;
    let entries = days
        .into_iter()
        .map(|(date, day)| RangeEntry {
            date,
            time_slots: match day {
                DayAvailability::Open(slots) => Some(slots),
                DayAvailability::Closed => None,
            },
        })
        .collect();
    Ok(Json(entries))
}

#[instrument(skip(state, admin, body), fields(admin = %admin.email, date = %body.date))]
pub async fn set_availability(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(body): Json<SetAvailabilityRequest>,
) -> AppResult<Json<AvailabilityResponse>> {
    let date = calendar::parse_date(body.date.trim())?;
    let day = services::set_availability(&state.db, date, &body.time_slots).await?;
    Ok(Json(day.into()))
}
