use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid menu item in cart")]
    InvalidItem,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Unable to order for this date")]
    AvailabilityClosed,

    /// Webhook signature mismatch. The reason is only logged.
    #[error("Invalid webhook signature")]
    Authentication(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Not an allowed admin")]
    Forbidden,

    #[error("payment provider error: {0:#}")]
    Upstream(anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::InvalidItem
            | AppError::Conflict(_)
            | AppError::AvailabilityClosed
            | AppError::Authentication(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Upstream(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to hand to a client.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Upstream(_) => "Payment provider error".into(),
            AppError::Database(_) | AppError::Internal(_) => "Internal server error".into(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Upstream(e) => error!(error = %format!("{e:#}"), "upstream failure"),
            AppError::Database(e) => error!(error = %e, "database failure"),
            AppError::Internal(e) => error!(error = %format!("{e:#}"), "internal failure"),
            AppError::Authentication(reason) => warn!(%reason, "webhook rejected"),
            _ => {}
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_details_are_withheld() {
        let err = AppError::Upstream(anyhow::anyhow!("card_declined: sk_live_secret"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Payment provider error");
    }

    #[test]
    fn signature_reason_is_withheld() {
        let err = AppError::Authentication("v1 mismatch".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Invalid webhook signature");
    }

    #[test]
    fn taxonomy_status_codes() {
        assert_eq!(AppError::NotFound("Order").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::NotFound("Order").public_message(), "Order not found");
        assert_eq!(AppError::conflict("Order is not pending").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::AvailabilityClosed.public_message(), "Unable to order for this date");
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
    }
}
