//! Kafka producer for image-job events
//!
//! `publish_job_queued` is the enqueue side of the work queue, called by the
//! upload-acceptance collaborator once a job row exists.

use std::sync::Arc;
use std::time::Duration;

use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Event announcing a newly created image job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageJobQueuedEvent {
    pub job_id: Uuid,
}

/// Kafka producer wrapper for image-job events
#[derive(Clone)]
pub struct JobEventsProducer {
    inner: Arc<FutureProducer>,
    topic: String,
}

impl JobEventsProducer {
    pub fn new(brokers: &str, topic: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| AppError::Queue(format!("failed to create producer for '{topic}': {e}")))?;

        Ok(Self {
            inner: Arc::new(producer),
            topic: topic.to_string(),
        })
    }

    /// Enqueue a job id for asynchronous processing.
    ///
    /// Keyed by job id; the dispatch contract is single-enqueue-per-job,
    /// which is what lets the worker's status check stand in for a lock.
    pub async fn publish_job_queued(&self, job_id: Uuid) -> Result<()> {
        let payload = serde_json::to_string(&ImageJobQueuedEvent { job_id })
            .map_err(|e| AppError::Queue(format!("failed to serialize job event: {e}")))?;
        let key = job_id.to_string();

        let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

        self.inner
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| AppError::Queue(format!("failed to publish job event: {e}")))?;

        Ok(())
    }
}
