use serde::{Deserialize, Serialize};

/// Session token payload issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,           // provider user ID
    pub exp: usize,            // expires at (unix timestamp)
    pub aud: String,           // audience
    pub email: Option<String>, // login e-mail, checked against the allowlist
}
