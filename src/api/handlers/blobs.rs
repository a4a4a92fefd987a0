use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::errors::ApiError;
use crate::api::router::AppState;
use crate::application::blob_store::BlobStat;
use crate::domain::value_objects::ContentTag;

/// GET /v1/blobs/{tag}
/// Reference count and size of one entry
#[utoipa::path(
    get,
    path = "/v1/blobs/{tag}",
    tag = "blobs",
    params(("tag" = String, Path, description = "64-character SHA-256 hex digest")),
    responses(
        (status = 200, description = "Entry statistics", body = BlobStat),
        (status = 400, description = "Malformed tag"),
        (status = 404, description = "No entry with this tag")
    )
)]
pub async fn blob_stat_handler(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<BlobStat>, ApiError> {
    let tag = ContentTag::parse(tag)?;

    match state.store.stat(&tag).await? {
        Some(stat) => Ok(Json(stat)),
        None => Err(ApiError::not_found(format!("No blob entry for {}", tag))),
    }
}
