use axum::{http::HeaderMap, response::Response};

use crate::api::cache::{self, CacheDecision};
use crate::api::errors::ApiError;
use crate::api::router::AppState;
use crate::domain::value_objects::OwnerKey;

/// Answer a content GET through the cache boundary.
///
/// Validators are checked against the digest first; bytes are only loaded
/// when the response needs a body.
pub(crate) async fn respond_with_content(
    state: &AppState,
    headers: &HeaderMap,
    owner: OwnerKey,
    group_id: i64,
) -> Result<Response, ApiError> {
    let digest = state.fetch_use_case.digest(owner, group_id).await?;

    match cache::evaluate(headers, &digest)? {
        CacheDecision::NotModified => Ok(cache::not_modified(&digest, &state.cache_policy)),
        CacheDecision::Serve => {
            let body = state.fetch_use_case.read(owner, group_id).await?;
            Ok(cache::serve(body, &state.cache_policy))
        }
    }
}
