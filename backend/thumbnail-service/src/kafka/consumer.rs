//! Kafka consumer for queued image jobs
//!
//! Pulls job ids off the durable queue and hands them to the orchestrator.
//! A per-job failure never ends the loop; the worker stays available for the
//! next message.

use std::sync::Arc;

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::ClientConfig;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, Result};
use crate::kafka::events::ImageJobQueuedEvent;
use crate::services::ProcessingOrchestrator;

/// Kafka consumer configuration
#[derive(Clone, Debug)]
pub struct JobConsumerConfig {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
}

#[derive(Debug, serde::Deserialize)]
struct EventEnvelope<T> {
    data: T,
}

/// Kafka consumer driving the processing orchestrator
pub struct JobConsumer {
    consumer: StreamConsumer,
    orchestrator: Arc<ProcessingOrchestrator>,
    shutdown_rx: watch::Receiver<bool>,
}

impl JobConsumer {
    pub fn new(
        config: &JobConsumerConfig,
        orchestrator: Arc<ProcessingOrchestrator>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "5000")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "45000")
            .set("max.poll.interval.ms", "300000")
            .create()
            .map_err(|e| AppError::Queue(format!("failed to create consumer: {e}")))?;

        consumer
            .subscribe(&[&config.topic])
            .map_err(|e| AppError::Queue(format!("failed to subscribe to '{}': {e}", config.topic)))?;

        info!(
            brokers = %config.brokers,
            topic = %config.topic,
            group_id = %config.group_id,
            "job consumer initialized"
        );

        Ok(Self {
            consumer,
            orchestrator,
            shutdown_rx,
        })
    }

    /// Run the consumer loop until shutdown
    pub async fn run(&mut self) -> Result<()> {
        use futures::StreamExt;

        info!("starting job consumer loop");

        let mut message_stream = self.consumer.stream();

        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("shutdown signal received, stopping consumer");
                        break;
                    }
                }

                message = message_stream.next() => {
                    match message {
                        Some(Ok(msg)) => {
                            if let Err(e) = self.process_message(&msg).await {
                                error!(error = %e, "failed to process message");
                            }
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "kafka consumer error");
                        }
                        None => {
                            warn!("message stream ended unexpectedly");
                            break;
                        }
                    }
                }
            }
        }

        info!("job consumer stopped");
        Ok(())
    }

    async fn process_message<M: Message>(&self, msg: &M) -> Result<()> {
        let payload = match msg.payload() {
            Some(p) => p,
            None => {
                debug!("empty message payload, skipping");
                return Ok(());
            }
        };

        let event = match parse_enveloped_or_direct(payload) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "failed to parse job event payload, skipping");
                return Ok(());
            }
        };

        debug!(job_id = %event.job_id, "received queued job");

        match self.orchestrator.process(event.job_id).await {
            Ok(()) => {}
            Err(AppError::AlreadyProcessing(job_id)) => {
                // duplicate dispatch; the first attempt owns the job
                warn!(job_id = %job_id, "job already pending, skipping duplicate dispatch");
            }
            Err(AppError::JobNotFound(job_id)) => {
                warn!(job_id = %job_id, "queued job no longer exists, skipping");
            }
            Err(e) => {
                error!(job_id = %event.job_id, error = %e, "job dispatch failed");
            }
        }

        Ok(())
    }
}

fn parse_enveloped_or_direct(payload: &[u8]) -> Result<ImageJobQueuedEvent> {
    if let Ok(envelope) = serde_json::from_slice::<EventEnvelope<ImageJobQueuedEvent>>(payload) {
        return Ok(envelope.data);
    }

    serde_json::from_slice::<ImageJobQueuedEvent>(payload)
        .map_err(|e| AppError::Queue(format!("unparseable job event: {e}")))
}
