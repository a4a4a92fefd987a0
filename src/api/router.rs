use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;

use crate::api::cache::CachePolicy;
use crate::api::handlers::{
    blob_stat_handler, delete_all_posts_handler, delete_avatar_handler, delete_post_handler,
    get_avatar_handler, get_post_data_handler, health_handler, put_avatar_handler,
    put_post_data_handler, readiness_handler,
};
use crate::api::middleware::request_log;
use crate::api::openapi::ApiDoc;
use crate::application::blob_store::BlobStore;
use crate::application::ports::SessionFactory;
use crate::application::use_cases::{AvatarUseCase, FetchContentUseCase, PostContentUseCase};

/// Application state container
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionFactory>,
    pub store: Arc<BlobStore>,
    pub avatar_use_case: Arc<AvatarUseCase>,
    pub post_content_use_case: Arc<PostContentUseCase>,
    pub fetch_use_case: Arc<FetchContentUseCase>,
    pub cache_policy: CachePolicy,
    pub max_content_bytes: usize,
}

async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Create router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    // Per-item limits are checked after decoding; base64 inflates post data by a third.
    let body_limit = state.max_content_bytes.saturating_mul(4) / 3 + 1024;

    Router::new()
        .route("/health", get(health_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/api-docs/openapi.json", get(openapi_handler))
        .route(
            "/v1/users/{user_id}/avatar",
            put(put_avatar_handler)
                .get(get_avatar_handler)
                .delete(delete_avatar_handler),
        )
        .route("/v1/users/{user_id}/posts", delete(delete_all_posts_handler))
        .route(
            "/v1/users/{user_id}/posts/{post_id}",
            put(put_post_data_handler).delete(delete_post_handler),
        )
        .route(
            "/v1/users/{user_id}/posts/{post_id}/data/{index}",
            get(get_post_data_handler),
        )
        .route("/v1/blobs/{tag}", get(blob_stat_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(axum_middleware::from_fn(
            request_log::request_log_middleware,
        ))
        .with_state(state)
}
