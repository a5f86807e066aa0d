use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub order_id: Option<Uuid>,
    #[serde(default)]
    pub tip_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}
