/// Configuration management for thumbnail-service
///
/// Loads configuration from environment variables with sensible defaults.
use serde::Deserialize;

use crate::error::{AppError, Result};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    pub s3: S3Config,
    pub processing: ProcessingConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub env: String,
    /// Base URL prepended to external thumbnail links
    pub public_base_url: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct KafkaConfig {
    pub brokers: String,
    pub jobs_topic: String,
    pub group_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProcessingConfig {
    /// JPEG quality (0-100) used when re-encoding thumbnails
    pub jpeg_quality: u8,
    /// Resize every thumbnail from the pristine original instead of chaining
    /// off the previous (larger) thumbnail. Output dimensions are identical;
    /// pixel content may differ slightly.
    pub resize_from_original: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                public_base_url: std::env::var("PUBLIC_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/thumbnails".to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            kafka: KafkaConfig {
                brokers: std::env::var("KAFKA_BROKERS")
                    .unwrap_or_else(|_| "localhost:9092".to_string()),
                jobs_topic: std::env::var("KAFKA_JOBS_TOPIC")
                    .unwrap_or_else(|_| "image.jobs".to_string()),
                group_id: std::env::var("KAFKA_GROUP_ID")
                    .unwrap_or_else(|_| "thumbnail-worker".to_string()),
            },
            s3: S3Config {
                bucket: std::env::var("S3_BUCKET")
                    .unwrap_or_else(|_| "thumbnail-uploads".to_string()),
                region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
                endpoint: std::env::var("S3_ENDPOINT").ok(),
            },
            processing: ProcessingConfig {
                jpeg_quality: std::env::var("THUMB_JPEG_QUALITY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(85),
                resize_from_original: std::env::var("THUMB_RESIZE_FROM_ORIGINAL")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(false),
            },
        })
    }

    /// Fail fast on values that would break processing at runtime
    pub fn validate(&self) -> Result<()> {
        if self.processing.jpeg_quality > 100 {
            return Err(AppError::Config(format!(
                "THUMB_JPEG_QUALITY must be 0-100, got {}",
                self.processing.jpeg_quality
            )));
        }
        if self.database.max_connections == 0 {
            return Err(AppError::Config(
                "DATABASE_MAX_CONNECTIONS must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
