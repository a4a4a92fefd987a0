//! Conditional GET for owner content.
//!
//! The content tag is the strong validator: responses carry `ETag: "<tag>"`
//! and the owner's `updated_at` as `Last-Modified`. `If-None-Match` wins over
//! `If-Modified-Since`; the latter is only consulted when the former is absent.

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::application::use_cases::{ContentBody, ContentDigest};
use crate::domain::value_objects::ContentTag;

pub const IF_NONE_MATCH_BAD_FORMAT: &str = "if_none_match_bad_format";
pub const IF_MODIFIED_SINCE_BAD_FORMAT: &str = "if_modified_since_bad_format";

const DEFAULT_MAX_AGE_SECS: u64 = 14 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheHeaderError {
    #[error("If-None-Match header is malformed: {0}")]
    IfNoneMatch(String),

    #[error("If-Modified-Since header is malformed: {0}")]
    IfModifiedSince(String),
}

impl CacheHeaderError {
    pub fn code(&self) -> &'static str {
        match self {
            CacheHeaderError::IfNoneMatch(_) => IF_NONE_MATCH_BAD_FORMAT,
            CacheHeaderError::IfModifiedSince(_) => IF_MODIFIED_SINCE_BAD_FORMAT,
        }
    }
}

/// Parsed `If-None-Match`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityTagCondition {
    Any,
    /// Opaque values of the listed entity-tags, weak prefix removed
    Tags(Vec<String>),
}

impl EntityTagCondition {
    /// Weak comparison against the current tag.
    pub fn matches(&self, tag: &ContentTag) -> bool {
        match self {
            EntityTagCondition::Any => true,
            EntityTagCondition::Tags(tags) => tags.iter().any(|t| t == tag.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    NotModified,
    Serve,
}

#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    max_age_secs: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AGE_SECS)
    }
}

impl CachePolicy {
    pub fn new(max_age_secs: u64) -> Self {
        Self { max_age_secs }
    }

    pub fn max_age_secs(&self) -> u64 {
        self.max_age_secs
    }

    pub fn cache_control(&self) -> String {
        format!(
            "private, no-cache, must-revalidate, max-age={}",
            self.max_age_secs
        )
    }
}

pub fn parse_if_none_match(value: &str) -> Result<EntityTagCondition, CacheHeaderError> {
    let value = value.trim();
    if value == "*" {
        return Ok(EntityTagCondition::Any);
    }

    let mut tags = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let quoted = part.strip_prefix("W/").unwrap_or(part);
        let opaque = quoted
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .filter(|opaque| !opaque.contains('"'))
            .ok_or_else(|| CacheHeaderError::IfNoneMatch(part.to_string()))?;
        tags.push(opaque.to_string());
    }

    if tags.is_empty() {
        return Err(CacheHeaderError::IfNoneMatch(value.to_string()));
    }
    Ok(EntityTagCondition::Tags(tags))
}

pub fn parse_http_date(value: &str) -> Result<DateTime<Utc>, CacheHeaderError> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|date| date.with_timezone(&Utc))
        .map_err(|_| CacheHeaderError::IfModifiedSince(value.to_string()))
}

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn http_date(date: DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn etag(tag: &ContentTag) -> String {
    format!("\"{}\"", tag)
}

/// Decide between 304 and a full response from the request's validators.
pub fn evaluate(
    headers: &HeaderMap,
    current: &ContentDigest,
) -> Result<CacheDecision, CacheHeaderError> {
    if let Some(value) = headers.get(header::IF_NONE_MATCH) {
        let value = value
            .to_str()
            .map_err(|_| CacheHeaderError::IfNoneMatch("non-ASCII value".to_string()))?;
        let condition = parse_if_none_match(value)?;
        return Ok(if condition.matches(&current.tag) {
            CacheDecision::NotModified
        } else {
            CacheDecision::Serve
        });
    }

    if let Some(value) = headers.get(header::IF_MODIFIED_SINCE) {
        let value = value
            .to_str()
            .map_err(|_| CacheHeaderError::IfModifiedSince("non-ASCII value".to_string()))?;
        let since = parse_http_date(value)?;
        // HTTP dates have one-second resolution.
        return Ok(if current.last_modified.timestamp() <= since.timestamp() {
            CacheDecision::NotModified
        } else {
            CacheDecision::Serve
        });
    }

    Ok(CacheDecision::Serve)
}

pub fn not_modified(digest: &ContentDigest, policy: &CachePolicy) -> Response {
    (
        StatusCode::NOT_MODIFIED,
        [
            (header::ETAG, etag(&digest.tag)),
            (header::LAST_MODIFIED, http_date(digest.last_modified)),
            (header::CACHE_CONTROL, policy.cache_control()),
        ],
    )
        .into_response()
}

pub fn serve(body: ContentBody, policy: &CachePolicy) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, body.digest.media_type.to_string()),
            (header::ETAG, etag(&body.digest.tag)),
            (header::LAST_MODIFIED, http_date(body.digest.last_modified)),
            (header::CACHE_CONTROL, policy.cache_control()),
        ],
        body.data,
    )
        .into_response()
}
