use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{
        AdminOrdersQuery, CancelledResponse, CreateOrderRequest, CreateOrderResponse, DayCount,
        FulfilledResponse, OrderDto, OrdersResponse, RangeQuery,
    },
    services,
};
use crate::{
    auth::AdminUser,
    calendar,
    error::{AppError, AppResult},
    state::AppState,
};

// --- routers ---

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/order", post(create_order))
        .route("/order/:id", get(get_order).delete(cancel_order))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/orders", get(list_orders))
        .route("/admin/orders-range", get(orders_range))
        .route("/admin/markFulfilled/:id", patch(mark_fulfilled))
}

// --- handlers ---

#[instrument(skip(state, body))]
pub async fn create_order(
    State(state): State<AppState>,
    Json(body): Json<CreateOrderRequest>,
) -> AppResult<Json<CreateOrderResponse>> {
    let order_id = services::create_order(&state, body, OffsetDateTime::now_utc()).await?;
    Ok(Json(CreateOrderResponse {
        success: true,
        order_id,
    }))
}

#[instrument(skip(state))]
pub async fn get_order(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<OrderDto>> {
    let (order, items) = services::get_order(&state.db, id).await?;
    Ok(Json(OrderDto::new(order, items)))
}

#[instrument(skip(state))]
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CancelledResponse>> {
    let cart = services::cancel_pending(&state.db, id).await?;
    Ok(Json(CancelledResponse { success: true, cart }))
}

/// GET /admin/orders?tab=upcoming|past or ?date=YYYY-MM-DD
#[instrument(skip(state, admin), fields(admin = %admin.email))]
pub async fn list_orders(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(q): Query<AdminOrdersQuery>,
) -> AppResult<Json<OrdersResponse>> {
    let filter = services::parse_filter(q.tab.as_deref(), q.date.as_deref())?;
    let orders = services::list_orders(&state.db, &state.calendar, filter, OffsetDateTime::now_utc())
        .await?
        .into_iter()
        .map(|(o, items)| OrderDto::new(o, items))
        .collect();
    Ok(Json(OrdersResponse { orders }))
}

#[instrument(skip(state, admin), fields(admin = %admin.email))]
pub async fn mark_fulfilled(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<FulfilledResponse>> {
    let (order, items) = services::mark_fulfilled(&state.db, id).await?;
    Ok(Json(FulfilledResponse {
        success: true,
        order: OrderDto::new(order, items),
    }))
}

#[instrument(skip(state, admin), fields(admin = %admin.email))]
pub async fn orders_range(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(q): Query<RangeQuery>,
) -> AppResult<Json<Vec<DayCount>>> {
    let start = q.start.as_deref().ok_or_else(|| AppError::validation("start is required"))?;
    let end = q.end.as_deref().ok_or_else(|| AppError::validation("end is required"))?;
    let counts =
        services::orders_range(&state.db, calendar::parse_date(start)?, calendar::parse_date(end)?).await?;
    Ok(Json(counts))
}
