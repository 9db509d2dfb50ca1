//! Thumbnail worker - consumes queued image jobs and runs the pipeline
//!
//! Environment variables:
//! - DATABASE_URL: PostgreSQL connection string
//! - KAFKA_BROKERS: Kafka broker addresses (default: localhost:9092)
//! - KAFKA_JOBS_TOPIC: topic carrying queued job ids (default: image.jobs)
//! - KAFKA_GROUP_ID: consumer group id (default: thumbnail-worker)
//! - S3_BUCKET / AWS_REGION / S3_ENDPOINT: blob store location
//! - THUMB_JPEG_QUALITY: JPEG quality 0-100 (default: 85)
//! - THUMB_RESIZE_FROM_ORIGINAL: independent resize mode (default: false)

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use thumbnail_service::db::{self, JobStore, PgJobStore, PgPlanCatalog, PlanCatalog};
use thumbnail_service::kafka::{JobConsumer, JobConsumerConfig};
use thumbnail_service::services::{GeneratorConfig, ProcessingOrchestrator, ThumbnailGenerator};
use thumbnail_service::storage::{build_s3_client, BlobStore, S3BlobStore};
use thumbnail_service::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("thumbnail_worker=info".parse().expect("valid directive"))
                .add_directive("thumbnail_service=info".parse().expect("valid directive")),
        )
        .init();

    info!("starting thumbnail worker");

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    config.validate()?;
    info!(
        env = %config.app.env,
        kafka_brokers = %config.kafka.brokers,
        kafka_topic = %config.kafka.jobs_topic,
        s3_bucket = %config.s3.bucket,
        "configuration loaded"
    );

    let pool = db::connect(&config.database).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("database pool ready");

    let s3_client = build_s3_client(&config.s3).await?;
    let blobs: Arc<dyn BlobStore> = Arc::new(S3BlobStore::new(s3_client, &config.s3));
    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool.clone()));
    let catalog: Arc<dyn PlanCatalog> = Arc::new(PgPlanCatalog::new(pool));

    let generator = Arc::new(ThumbnailGenerator::new(GeneratorConfig {
        jpeg_quality: config.processing.jpeg_quality,
        resize_from_original: config.processing.resize_from_original,
    }));
    let orchestrator = Arc::new(ProcessingOrchestrator::new(store, catalog, blobs, generator));

    // graceful shutdown on SIGINT
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl+c");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let consumer_config = JobConsumerConfig {
        brokers: config.kafka.brokers.clone(),
        topic: config.kafka.jobs_topic.clone(),
        group_id: config.kafka.group_id.clone(),
    };
    let mut consumer = JobConsumer::new(&consumer_config, orchestrator, shutdown_rx)?;

    consumer.run().await?;

    info!("thumbnail worker stopped");
    Ok(())
}
