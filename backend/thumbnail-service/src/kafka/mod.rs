//! Work queue plumbing: job event producer and the worker consumer

pub mod consumer;
pub mod events;

pub use consumer::{JobConsumer, JobConsumerConfig};
pub use events::{ImageJobQueuedEvent, JobEventsProducer};
