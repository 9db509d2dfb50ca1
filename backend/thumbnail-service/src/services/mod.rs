//! Processing core: generator, orchestrator and external link resolver

pub mod generator;
pub mod orchestrator;
pub mod resolver;

pub use generator::{GeneratedThumbnail, GeneratorConfig, ImageKind, ThumbnailGenerator};
pub use orchestrator::ProcessingOrchestrator;
pub use resolver::ExternalLinkResolver;
