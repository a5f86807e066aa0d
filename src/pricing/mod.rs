mod dto;
pub mod handlers;
pub mod rules;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub use rules::{CartLine, PricedLine, Variant};

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::routes())
}
