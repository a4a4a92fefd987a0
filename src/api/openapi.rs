use utoipa::OpenApi;

use crate::api::handlers::health::{HealthResponse, ReadinessResponse};
use crate::application::blob_store::BlobStat;
use crate::application::dto::{
    ContentTagResponse, DetachedResponse, PostDataItemRequest, PostDataResponse,
    ReplacePostDataRequest,
};

/// OpenAPI document served at `/api-docs/openapi.json`
#[derive(OpenApi)]
#[openapi(
    info(
        title = "tagstore API",
        version = "0.1.0",
        description = "Deduplicated, reference-counted content for avatars and post data"
    ),
    paths(
        crate::api::handlers::health::health_handler,
        crate::api::handlers::health::readiness_handler,
        crate::api::handlers::avatar::put_avatar_handler,
        crate::api::handlers::avatar::get_avatar_handler,
        crate::api::handlers::avatar::delete_avatar_handler,
        crate::api::handlers::posts::put_post_data_handler,
        crate::api::handlers::posts::get_post_data_handler,
        crate::api::handlers::posts::delete_post_handler,
        crate::api::handlers::posts::delete_all_posts_handler,
        crate::api::handlers::blobs::blob_stat_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadinessResponse,
            BlobStat,
            ContentTagResponse,
            DetachedResponse,
            PostDataItemRequest,
            PostDataResponse,
            ReplacePostDataRequest,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "avatars", description = "User avatars"),
        (name = "posts", description = "Post data lists"),
        (name = "blobs", description = "Blob entry diagnostics")
    )
)]
pub struct ApiDoc;
