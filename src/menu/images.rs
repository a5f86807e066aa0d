use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use super::{repo, repo_types::MenuItemRow};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// Stores the image and points the item's `imageUrl` at it.
pub async fn upload_item_image(st: &AppState, item_id: Uuid, img: UploadItem) -> AppResult<MenuItemRow> {
    let ext = ext_from_mime(&img.content_type).ok_or_else(|| {
        AppError::validation(format!("Unsupported image type: {}", img.content_type))
    })?;
    if img.body.is_empty() {
        return Err(AppError::validation("file is empty"));
    }
    if img.body.len() > MAX_IMAGE_BYTES {
        return Err(AppError::validation("file exceeds 10 MB"));
    }
    repo::find_by_id(&st.db, item_id)
        .await?
        .filter(|r| !r.deleted)
        .ok_or(AppError::NotFound("Menu item"))?;

    let key = image_key(item_id, Uuid::new_v4(), ext);
    st.images.put_image(&key, img.body, &img.content_type).await?;

    let url = st.images.public_url(&key);
    match repo::set_image_url(&st.db, item_id, &url).await {
        Ok(Some(row)) => {
            info!(%item_id, %key, "menu image stored");
            Ok(row)
        }
        Ok(None) => {
            discard(st, &key).await;
            Err(AppError::NotFound("Menu item"))
        }
        Err(e) => {
            discard(st, &key).await;
            Err(e.into())
        }
    }
}

async fn discard(st: &AppState, key: &str) {
    if let Err(e) = st.images.remove_image(key).await {
        warn!(error = %format!("{e:#}"), %key, "orphaned image left in storage");
    }
}

fn image_key(item_id: Uuid, image_id: Uuid, ext: &str) -> String {
    format!("menu/{item_id}/{image_id}.{ext}")
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}
