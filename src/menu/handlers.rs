use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CreateMenuItemRequest, DeletedResponse, MenuItemDto, MenuQuery, UpdateMenuItemRequest},
    images::{self, UploadItem, MAX_IMAGE_BYTES},
    services,
};
use crate::{
    auth::AdminUser,
    calendar,
    error::{AppError, AppResult},
    state::AppState,
};

// --- routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/menu", get(list_menu))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/menu", get(list_admin_menu).post(create_item))
        .route("/admin/menu/:id", patch(update_item).delete(delete_item))
        .route(
            "/admin/menu/:id/image",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024)),
        )
}

// --- handlers ---

fn to_dtos(rows: Vec<super::repo_types::MenuItemRow>) -> Json<Vec<MenuItemDto>> {
    Json(rows.into_iter().map(MenuItemDto::from).collect())
}

/// GET /menu?date=YYYY-MM-DD; all active items without a date.
#[instrument(skip(state))]
pub async fn list_menu(
    State(state): State<AppState>,
    Query(q): Query<MenuQuery>,
) -> AppResult<Json<Vec<MenuItemDto>>> {
    let rows = match q.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => services::list_items_for_date(&state.db, calendar::parse_date(raw)?).await?,
        None => services::list_active_items(&state.db).await?,
    };
    Ok(to_dtos(rows))
}

#[instrument(skip(state, admin), fields(admin = %admin.email))]
pub async fn list_admin_menu(
    State(state): State<AppState>,
    admin: AdminUser,
) -> AppResult<Json<Vec<MenuItemDto>>> {
    Ok(to_dtos(services::list_admin_items(&state.db).await?))
}

#[instrument(skip(state, admin, body), fields(admin = %admin.email))]
pub async fn create_item(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(body): Json<CreateMenuItemRequest>,
) -> AppResult<(StatusCode, Json<MenuItemDto>)> {
    let row = services::create_item(&state.db, body).await?;
    Ok((StatusCode::CREATED, Json(row.into())))
}

#[instrument(skip(state, admin, body), fields(admin = %admin.email))]
pub async fn update_item(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateMenuItemRequest>,
) -> AppResult<Json<MenuItemDto>> {
    let row = services::update_item(&state.db, id, body).await?;
    Ok(Json(row.into()))
}

#[instrument(skip(state, admin), fields(admin = %admin.email))]
pub async fn delete_item(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeletedResponse>> {
    services::soft_delete_item(&state.db, id).await?;
    Ok(Json(DeletedResponse { success: true }))
}

/// POST /admin/menu/:id/image (multipart, field `file`)
#[instrument(skip(state, admin, mp), fields(admin = %admin.email))]
pub async fn upload_image(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    mut mp: Multipart,
) -> AppResult<Json<MenuItemDto>> {
    let mut upload = None;
    loop {
        let field = match mp.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "malformed multipart body");
                return Err(AppError::validation("Malformed upload"));
            }
        };
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let body = field
            .bytes()
            .await
            .map_err(|_| AppError::validation("file exceeds 10 MB"))?;
        upload = Some(UploadItem { body, content_type });
        break;
    }
    let upload = upload.ok_or_else(|| AppError::validation("file is required"))?;
    let row = images::upload_item_image(&state, id, upload).await?;
    Ok(Json(row.into()))
}
