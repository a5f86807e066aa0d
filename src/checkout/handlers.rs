use axum::{extract::State, routing::post, Json, Router};
use time::OffsetDateTime;
use tracing::instrument;

use super::{
    dto::{CheckoutRequest, CheckoutResponse},
    services,
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/checkout", post(create_checkout))
}

#[instrument(skip(state))]
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(body): Json<CheckoutRequest>,
) -> AppResult<Json<CheckoutResponse>> {
    let order_id = body
        .order_id
        .ok_or_else(|| AppError::validation("Missing orderId"))?;
    let url =
        services::create_checkout_session(&state, order_id, body.tip_cents, OffsetDateTime::now_utc())
            .await?;
    Ok(Json(CheckoutResponse { url }))
}
