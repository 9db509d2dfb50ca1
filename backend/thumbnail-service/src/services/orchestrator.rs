//! Processing orchestrator - drives one image job from queued to terminal
//!
//! `process` is the worker entry point. The pending transition is persisted
//! before generation starts, so a crash mid-generation leaves the job visibly
//! pending instead of silently reverting to new. Generation and storage
//! failures are converted into a terminal error status here; they never
//! propagate out and take the worker down.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::{JobForProcessing, JobStore, PlanCatalog};
use crate::error::{AppError, Result};
use crate::models::{file_extension, JobStatus, NewThumbnail};
use crate::services::generator::{ImageKind, ThumbnailGenerator};
use crate::storage::BlobStore;

pub struct ProcessingOrchestrator {
    store: Arc<dyn JobStore>,
    catalog: Arc<dyn PlanCatalog>,
    blobs: Arc<dyn BlobStore>,
    generator: Arc<ThumbnailGenerator>,
}

impl ProcessingOrchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        catalog: Arc<dyn PlanCatalog>,
        blobs: Arc<dyn BlobStore>,
        generator: Arc<ThumbnailGenerator>,
    ) -> Self {
        Self {
            store,
            catalog,
            blobs,
            generator,
        }
    }

    /// Process a queued image job.
    ///
    /// Fails with `JobNotFound` or `AlreadyProcessing` without touching any
    /// state; both reject the call and the caller must not retry blindly.
    /// Every other failure is absorbed into a persisted error status.
    pub async fn process(&self, job_id: Uuid) -> Result<()> {
        let job = self
            .store
            .job_for_processing(job_id)
            .await?
            .ok_or(AppError::JobNotFound(job_id))?;

        if job.get_status() == JobStatus::Pending {
            return Err(AppError::AlreadyProcessing(job_id));
        }

        // durable before generation: a crash leaves the job visibly pending
        self.store.set_status(job_id, JobStatus::Pending).await?;

        match self.run(&job).await {
            Ok(count) => {
                info!(job_id = %job_id, thumbnails = count, "image job completed");
                Ok(())
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "image job failed");
                if let Err(persist_err) = self.store.set_status(job_id, JobStatus::Error).await {
                    error!(
                        job_id = %job_id,
                        error = %persist_err,
                        "failed to persist error status"
                    );
                }
                Ok(())
            }
        }
    }

    async fn run(&self, job: &JobForProcessing) -> Result<usize> {
        let original_key = job
            .original_image
            .clone()
            .ok_or_else(|| AppError::InvalidInput("job has no original image".to_string()))?;

        let ext = file_extension(&original_key).to_string();
        let kind =
            ImageKind::from_extension(&ext).ok_or_else(|| AppError::UnsupportedFormat(ext.clone()))?;

        let heights = self.catalog.sizes_for(job.plan_id).await?;
        let original = self.blobs.get(&original_key).await?;
        let generated = self
            .generator
            .clone()
            .generate_async(original, kind, heights)
            .await?;

        // one expiry instant per job, shared by every thumbnail
        let expiring_allowed = self.catalog.allows_expiring_link(job.plan_id).await?;
        let expires_at = match job.link_expires_in {
            Some(secs) if secs > 0 && expiring_allowed => {
                Some(Utc::now() + Duration::seconds(i64::from(secs)))
            }
            _ => None,
        };

        let mut rows = Vec::with_capacity(generated.len());
        for thumbnail in &generated {
            let id = Uuid::new_v4();
            let key = format!("thumbs/{}/{}_thumb_{}.{}", job.id, id, thumbnail.height, ext);
            self.blobs
                .put(&key, thumbnail.data.clone(), kind.content_type())
                .await?;
            rows.push(NewThumbnail {
                id,
                image: key,
                height: thumbnail.height as i32,
                external_id: expires_at.map(|_| Uuid::new_v4()),
                external_id_expires_at: expires_at,
            });
        }

        let clear_original = !self.catalog.allows_retain(job.plan_id).await?;
        let count = rows.len();
        self.store.complete(job.id, rows, clear_original).await?;

        // outside the transaction; a failure here leaks an orphan blob
        if clear_original {
            if let Err(e) = self.blobs.delete(&original_key).await {
                warn!(
                    job_id = %job.id,
                    key = %original_key,
                    error = %e,
                    "failed to delete original blob"
                );
            }
        }

        Ok(count)
    }
}
