//! Blob storage abstraction
//!
//! Originals and thumbnails live in a content-addressable blob store keyed by
//! path. The database transaction guards metadata only; blob writes and
//! deletes are best-effort around it.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

pub mod s3;

pub use s3::{build_s3_client, S3BlobStore};

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Download the blob stored under `key`
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Store `data` under `key`, returning the public URL
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<String>;

    /// Delete the blob under `key`; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Public URL for `key` without touching the store
    fn get_url(&self, key: &str) -> String;
}
