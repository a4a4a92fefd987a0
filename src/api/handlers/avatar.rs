use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::api::errors::ApiError;
use crate::api::handlers::content::respond_with_content;
use crate::api::router::AppState;
use crate::application::dto::ContentTagResponse;
use crate::application::errors::ContentUseCaseError;
use crate::domain::value_objects::{MediaType, OwnerKey};

/// PUT /v1/users/{user_id}/avatar
/// Create or replace a user's avatar from the raw request body
#[utoipa::path(
    put,
    path = "/v1/users/{user_id}/avatar",
    tag = "avatars",
    params(("user_id" = i64, Path, description = "User id")),
    request_body(content = Vec<u8>, content_type = "image/png"),
    responses(
        (status = 200, description = "Avatar stored", body = ContentTagResponse),
        (status = 400, description = "Missing body or content type"),
        (status = 413, description = "Body exceeds the content size limit"),
        (status = 415, description = "Not an accepted image type")
    )
)]
pub async fn put_avatar_handler(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ContentTagResponse>, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("Content-Type header is required"))?;
    let media_type = MediaType::parse(content_type)?;

    if body.is_empty() {
        return Err(ApiError::bad_request("Request body is empty"));
    }
    if body.len() > state.max_content_bytes {
        return Err(ContentUseCaseError::TooLarge {
            size: body.len(),
            limit: state.max_content_bytes,
        }
        .into());
    }

    let change = state
        .avatar_use_case
        .set(user_id, body, &media_type)
        .await?;

    Ok(Json(change.into()))
}

/// GET /v1/users/{user_id}/avatar
#[utoipa::path(
    get,
    path = "/v1/users/{user_id}/avatar",
    tag = "avatars",
    params(
        ("user_id" = i64, Path, description = "User id"),
        ("If-None-Match" = Option<String>, Header, description = "Entity tags held by the client"),
        ("If-Modified-Since" = Option<String>, Header, description = "HTTP date")
    ),
    responses(
        (status = 200, description = "Avatar bytes"),
        (status = 304, description = "Client copy is current"),
        (status = 400, description = "Malformed conditional header"),
        (status = 404, description = "User has no avatar and no default is configured")
    )
)]
pub async fn get_avatar_handler(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    respond_with_content(&state, &headers, OwnerKey::avatar(user_id), user_id).await
}

/// DELETE /v1/users/{user_id}/avatar
#[utoipa::path(
    delete,
    path = "/v1/users/{user_id}/avatar",
    tag = "avatars",
    params(("user_id" = i64, Path, description = "User id")),
    responses(
        (status = 204, description = "Avatar removed"),
        (status = 404, description = "User has no avatar")
    )
)]
pub async fn delete_avatar_handler(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Response, ApiError> {
    state.avatar_use_case.delete(user_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
