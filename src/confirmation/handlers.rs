use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::{debug, instrument};

use super::services::{self, WebhookOutcome};
use crate::{error::AppResult, state::AppState};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes() -> Router<AppState> {
    Router::new().route("/webhook", post(payment_webhook))
}

/// Signature failures are terminal 400s; storage failures surface as 5xx so
/// the provider retries.
#[instrument(skip(state, headers, body), fields(len = body.len()))]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let outcome = services::handle_payment_confirmed(
        &state.db,
        &body,
        signature,
        &state.config.stripe,
        OffsetDateTime::now_utc(),
    )
    .await?;
    Ok(Json(match outcome {
        WebhookOutcome::Settled(order) => json!({ "success": true, "orderId": order.id }),
        WebhookOutcome::Ignored(kind) => {
            debug!(%kind, "event acknowledged without action");
            json!({ "received": true })
        }
    }))
}
