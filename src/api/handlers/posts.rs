use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::handlers::content::respond_with_content;
use crate::api::router::AppState;
use crate::application::dto::{DetachedResponse, PostDataResponse, ReplacePostDataRequest};
use crate::domain::value_objects::OwnerKey;

/// PUT /v1/users/{user_id}/posts/{post_id}
/// Replace the data list of a post
#[utoipa::path(
    put,
    path = "/v1/users/{user_id}/posts/{post_id}",
    tag = "posts",
    params(
        ("user_id" = i64, Path, description = "Author id"),
        ("post_id" = i64, Path, description = "Post id")
    ),
    request_body = ReplacePostDataRequest,
    responses(
        (status = 200, description = "Data list stored", body = PostDataResponse),
        (status = 400, description = "Invalid data list"),
        (status = 404, description = "Post belongs to another user"),
        (status = 413, description = "An item exceeds the content size limit"),
        (status = 415, description = "Unsupported content type")
    )
)]
pub async fn put_post_data_handler(
    State(state): State<AppState>,
    Path((user_id, post_id)): Path<(i64, i64)>,
    payload: Result<Json<ReplacePostDataRequest>, JsonRejection>,
) -> Result<Json<PostDataResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    request
        .validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    let items = request.decode(state.max_content_bytes)?;
    let tags = state
        .post_content_use_case
        .replace_data(user_id, post_id, items)
        .await?;

    Ok(Json(PostDataResponse::new(post_id, tags)))
}

/// GET /v1/users/{user_id}/posts/{post_id}/data/{index}
#[utoipa::path(
    get,
    path = "/v1/users/{user_id}/posts/{post_id}/data/{index}",
    tag = "posts",
    params(
        ("user_id" = i64, Path, description = "Author id"),
        ("post_id" = i64, Path, description = "Post id"),
        ("index" = i32, Path, description = "Position in the data list"),
        ("If-None-Match" = Option<String>, Header, description = "Entity tags held by the client"),
        ("If-Modified-Since" = Option<String>, Header, description = "HTTP date")
    ),
    responses(
        (status = 200, description = "Data bytes"),
        (status = 304, description = "Client copy is current"),
        (status = 400, description = "Malformed conditional header or index"),
        (status = 404, description = "No data at this index")
    )
)]
pub async fn get_post_data_handler(
    State(state): State<AppState>,
    Path((user_id, post_id, index)): Path<(i64, i64, i32)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let owner = OwnerKey::post_data(post_id, index)?;
    respond_with_content(&state, &headers, owner, user_id).await
}

/// DELETE /v1/users/{user_id}/posts/{post_id}
/// Soft delete: the post's data is released, the post record is kept
#[utoipa::path(
    delete,
    path = "/v1/users/{user_id}/posts/{post_id}",
    tag = "posts",
    params(
        ("user_id" = i64, Path, description = "Author id"),
        ("post_id" = i64, Path, description = "Post id")
    ),
    responses(
        (status = 204, description = "Post data released"),
        (status = 404, description = "Post belongs to another user")
    )
)]
pub async fn delete_post_handler(
    State(state): State<AppState>,
    Path((user_id, post_id)): Path<(i64, i64)>,
) -> Result<Response, ApiError> {
    state
        .post_content_use_case
        .delete_post(user_id, post_id)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// DELETE /v1/users/{user_id}/posts
/// Hard delete of every post of a user
#[utoipa::path(
    delete,
    path = "/v1/users/{user_id}/posts",
    tag = "posts",
    params(("user_id" = i64, Path, description = "Author id")),
    responses(
        (status = 200, description = "Number of data slots released", body = DetachedResponse)
    )
)]
pub async fn delete_all_posts_handler(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<DetachedResponse>, ApiError> {
    let detached = state
        .post_content_use_case
        .delete_all_posts(user_id)
        .await?;
    Ok(Json(DetachedResponse { detached }))
}
