use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ValidatePromoQuery {
    pub code: Option<String>,
    pub subtotal: Option<i64>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePromoRequest {
    pub code: Option<String>,
    pub email: Option<String>,
    pub subtotal_cents: Option<i64>,
}
