/// S3 blob store
///
/// Production implementation of [`BlobStore`] backed by aws-sdk-s3. Supports
/// custom endpoints (MinIO and friends) via `S3_ENDPOINT`.
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use crate::config::S3Config;
use crate::error::{AppError, Result};
use crate::storage::BlobStore;

/// Build an AWS S3 client from the provided configuration.
pub async fn build_s3_client(config: &S3Config) -> Result<Client> {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.region.clone()));

    // Explicit credentials when configured, default provider chain otherwise
    if let (Some(access_key_id), Some(secret_access_key)) =
        (&config.access_key_id, &config.secret_access_key)
    {
        loader = loader.credentials_provider(Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "thumbnail-service",
        ));
    }

    let shared_config = loader.load().await;

    let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);
    if let Some(endpoint) = &config.endpoint {
        if !endpoint.trim().is_empty() {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
    }

    Ok(Client::from_conf(builder.build()))
}

pub struct S3BlobStore {
    client: Client,
    bucket: String,
    region: String,
    endpoint: Option<String>,
}

impl S3BlobStore {
    pub fn new(client: Client, config: &S3Config) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get(&self, key: &str) -> Result<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("failed to download '{key}': {e}")))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("failed to read body of '{key}': {e}")))?;

        Ok(data.into_bytes())
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("failed to upload '{key}': {e}")))?;

        Ok(self.get_url(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        // S3 DeleteObject succeeds for missing keys as well
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("failed to delete '{key}': {e}")))?;

        Ok(())
    }

    fn get_url(&self, key: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => format!(
                "{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.bucket,
                key
            ),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            ),
        }
    }
}
