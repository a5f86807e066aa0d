use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use tracing::{debug, warn};

use super::claims::Claims;
use crate::{config::AdminAuthConfig, error::AppError, state::AppState};

/// Verification material for admin session tokens.
#[derive(Clone)]
pub struct AdminKeys {
    pub decoding: DecodingKey,
    pub audience: String,
    pub allowed_emails: Vec<String>,
}

impl FromRef<AppState> for AdminKeys {
    fn from_ref(state: &AppState) -> Self {
        let AdminAuthConfig {
            jwt_secret,
            audience,
            allowed_emails,
        } = state.config.admin.clone();
        Self {
            decoding: DecodingKey::from_secret(jwt_secret.as_bytes()),
            audience,
            allowed_emails,
        }
    }
}

impl AdminKeys {
    /// Verifies the token and checks its e-mail against the allowlist.
    pub fn authorize(&self, token: &str) -> Result<AdminUser, AppError> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            warn!(error = %e, "admin token rejected");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;

        let email = data
            .claims
            .email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .ok_or(AppError::Forbidden)?;
        if !self.allowed_emails.iter().any(|a| a == &email) {
            warn!(%email, "token holder is not an allowed admin");
            return Err(AppError::Forbidden);
        }
        debug!(%email, "admin authorized");
        Ok(AdminUser { email })
    }
}

/// An authenticated back-office user.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub email: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    AdminKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = AdminKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;

        keys.authorize(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use time::OffsetDateTime;

    fn keys() -> AdminKeys {
        AdminKeys {
            decoding: DecodingKey::from_secret(b"test-secret"),
            audience: "authenticated".into(),
            allowed_emails: vec!["owner@bakery.test".into()],
        }
    }

    fn token(secret: &str, aud: &str, email: Option<&str>, ttl_secs: i64) -> String {
        let claims = Claims {
            sub: "user-1".into(),
            exp: (OffsetDateTime::now_utc().unix_timestamp() + ttl_secs) as usize,
            aud: aud.into(),
            email: email.map(str::to_string),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn allowlisted_email_is_authorized_case_insensitively() {
        let t = token("test-secret", "authenticated", Some("Owner@Bakery.test"), 600);
        let admin = keys().authorize(&t).expect("authorized");
        assert_eq!(admin.email, "owner@bakery.test");
    }

    #[test]
    fn other_email_is_forbidden() {
        let t = token("test-secret", "authenticated", Some("someone@else.test"), 600);
        assert!(matches!(keys().authorize(&t), Err(AppError::Forbidden)));
        let t = token("test-secret", "authenticated", None, 600);
        assert!(matches!(keys().authorize(&t), Err(AppError::Forbidden)));
    }

    #[test]
    fn bad_signature_audience_or_expiry_is_unauthorized() {
        for t in [
            token("wrong-secret", "authenticated", Some("owner@bakery.test"), 600),
            token("test-secret", "anon", Some("owner@bakery.test"), 600),
            token("test-secret", "authenticated", Some("owner@bakery.test"), -600),
        ] {
            assert!(matches!(keys().authorize(&t), Err(AppError::Unauthorized(_))));
        }
    }
}
