//! # tagstore - Reference-Counted Content Store
//!
//! Deduplicated binary content for user avatars and post data, with
//! reference counting and HTTP cache validation, built on Clean Architecture
//! principles.
//!
//! ## Architecture Layers
//!
//! - **Domain**: digest function, entities, value objects
//! - **Application**: blob store, owner lifecycle protocol, use cases, ports
//! - **Infrastructure**: Postgres and in-memory persistence, content validation
//! - **API**: HTTP handlers, cache boundary, middleware
//!
//! ## Key Features
//!
//! - Content-addressable storage keyed by SHA-256 with automatic deduplication
//! - Entries are removed in the transaction that frees their last reference
//! - Owner field updates and reference changes commit together
//! - `ETag` / `If-None-Match` / `If-Modified-Since` support
//! - Offline reference audit (`audit_refs`)
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use tagstore::{application::blob_store::BlobStore, infrastructure::persistence::MemoryStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = BlobStore::new(Arc::new(MemoryStore::new()));
//! let tag = store.retain(Bytes::from_static(b"hello")).await?;
//! assert_eq!(store.get(&tag).await?, Some(Bytes::from_static(b"hello")));
//! store.free(&tag).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export key types explicitly to avoid ambiguity
pub use api::errors as api_errors;
pub use application::blob_store::{BlobStat, BlobStore, RetryPolicy};
pub use application::{dto, ports, use_cases};
pub use config::Config;
pub use domain::digest::digest;
pub use domain::errors as domain_errors;
pub use domain::{entities, value_objects};
