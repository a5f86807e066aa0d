use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{
        BannerDto, BannersResponse, CreateDiscountRequest, DeletedResponse, DiscountDto,
        DiscountResponse, DiscountsResponse, UpdateDiscountRequest,
    },
    services,
};
use crate::{auth::AdminUser, error::AppResult, state::AppState};

// --- routers ---

pub fn public_routes() -> Router<AppState> {
    Router::new().route("/discount-banners", get(list_banners))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/discounts", get(list_discounts).post(create_discount))
        .route(
            "/admin/discounts/:id",
            get(get_discount).patch(update_discount).delete(delete_discount),
        )
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_banners(State(state): State<AppState>) -> AppResult<Json<BannersResponse>> {
    let banners = services::list_banners(&state.db, OffsetDateTime::now_utc())
        .await?
        .into_iter()
        .map(|d| BannerDto {
            id: d.id,
            code: d.code,
            banner_message: d.banner_message,
        })
        .collect();
    Ok(Json(BannersResponse { banners }))
}

#[instrument(skip(state, admin), fields(admin = %admin.email))]
pub async fn list_discounts(
    State(state): State<AppState>,
    admin: AdminUser,
) -> AppResult<Json<DiscountsResponse>> {
    let now = OffsetDateTime::now_utc();
    let discounts = services::list_discounts(&state.db)
        .await?
        .into_iter()
        .map(|d| DiscountDto::new(d, now))
        .collect();
    Ok(Json(DiscountsResponse { discounts }))
}

#[instrument(skip(state, admin), fields(admin = %admin.email))]
pub async fn get_discount(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DiscountDto>> {
    let row = services::get_discount(&state.db, id).await?;
    Ok(Json(DiscountDto::new(row, OffsetDateTime::now_utc())))
}

#[instrument(skip(state, admin, body), fields(admin = %admin.email))]
pub async fn create_discount(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(body): Json<CreateDiscountRequest>,
) -> AppResult<(StatusCode, Json<DiscountResponse>)> {
    let now = OffsetDateTime::now_utc();
    let row = services::create_discount(&state.db, state.payments.as_ref(), body, now).await?;
    Ok((
        StatusCode::CREATED,
        Json(DiscountResponse {
            success: true,
            discount: DiscountDto::new(row, now),
        }),
    ))
}

#[instrument(skip(state, admin, body), fields(admin = %admin.email))]
pub async fn update_discount(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateDiscountRequest>,
) -> AppResult<Json<DiscountResponse>> {
    let now = OffsetDateTime::now_utc();
    let row = services::update_discount(&state.db, state.payments.as_ref(), id, body, now).await?;
    Ok(Json(DiscountResponse {
        success: true,
        discount: DiscountDto::new(row, now),
    }))
}

#[instrument(skip(state, admin), fields(admin = %admin.email))]
pub async fn delete_discount(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeletedResponse>> {
    services::delete_discount(&state.db, state.payments.as_ref(), id).await?;
    Ok(Json(DeletedResponse { success: true }))
}
