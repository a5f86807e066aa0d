use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use super::{
    dto::{ValidatePromoQuery, ValidatePromoRequest},
    rules::DiscountCheck,
    services::{self, StoreHistory},
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/validate-promo", get(validate_promo_query).post(validate_promo_body))
}

async fn run_validation(
    state: &AppState,
    code: Option<String>,
    email: Option<String>,
    subtotal: Option<i64>,
) -> AppResult<Json<DiscountCheck>> {
    let code = code.ok_or_else(|| AppError::validation("code is required"))?;
    let subtotal = subtotal.ok_or_else(|| AppError::validation("subtotal is required"))?;
    let history = StoreHistory {
        db: &state.db,
        payments: state.payments.as_ref(),
    };
    let check = services::validate_discount(
        &state.db,
        &history,
        &code,
        email.as_deref(),
        subtotal,
        OffsetDateTime::now_utc(),
    )
    .await?;
    Ok(Json(check))
}

#[instrument(skip(state))]
pub async fn validate_promo_query(
    State(state): State<AppState>,
    Query(q): Query<ValidatePromoQuery>,
) -> AppResult<Json<DiscountCheck>> {
    run_validation(&state, q.code, q.email, q.subtotal).await
}

#[instrument(skip(state))]
pub async fn validate_promo_body(
    State(state): State<AppState>,
    Json(body): Json<ValidatePromoRequest>,
) -> AppResult<Json<DiscountCheck>> {
    run_validation(&state, body.code, body.email, body.subtotal_cents).await
}
