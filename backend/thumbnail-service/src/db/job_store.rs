//! Job store - persistence operations for image jobs and their thumbnails
//!
//! The trait is the seam the orchestrator and resolver are written against;
//! [`PgJobStore`] is the Postgres implementation. The completion write is a
//! single transaction so thumbnails, the cleared original reference and the
//! final status become visible together or not at all.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{CreateImageJobRequest, ImageJob, JobStatus, NewThumbnail, Thumbnail};

/// The slice of a job the processing pipeline needs, with the plan id
/// resolved through the user's plan binding
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobForProcessing {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub original_image: Option<String>,
    pub link_expires_in: Option<i32>,
    pub status: String,
}

impl JobForProcessing {
    pub fn get_status(&self) -> JobStatus {
        JobStatus::from_str(&self.status).unwrap_or(JobStatus::New)
    }
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Load a job together with its plan id; `None` when the job is absent
    async fn job_for_processing(&self, job_id: Uuid) -> Result<Option<JobForProcessing>>;

    /// Durably persist a status change
    async fn set_status(&self, job_id: Uuid, status: JobStatus) -> Result<()>;

    /// Atomically record a successful run: bulk-insert the thumbnails,
    /// optionally null the original image reference, and mark the job done
    async fn complete(
        &self,
        job_id: Uuid,
        thumbnails: Vec<NewThumbnail>,
        clear_original: bool,
    ) -> Result<()>;

    /// Look a thumbnail up by its external link id
    async fn thumbnail_by_external_id(&self, external_id: Uuid) -> Result<Option<Thumbnail>>;
}

/// Postgres-backed job store
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new job in state N for the user's current plan binding.
    /// Used by the upload-acceptance path, not by the worker.
    pub async fn create_job(
        &self,
        user_plan_id: Uuid,
        request: &CreateImageJobRequest,
    ) -> Result<ImageJob> {
        request.validate_request()?;

        let job = sqlx::query_as::<_, ImageJob>(
            r#"
            INSERT INTO image_jobs (user_plan_id, original_image, link_expires_in, status)
            VALUES ($1, $2, $3, 'N')
            RETURNING id, user_plan_id, original_image, link_expires_in, created_at, status
            "#,
        )
        .bind(user_plan_id)
        .bind(&request.original_image)
        .bind(request.link_expires_in)
        .fetch_one(&self.pool)
        .await?;

        Ok(job)
    }

    /// Jobs belonging to a user, newest first
    pub async fn jobs_for_user(&self, user_id: Uuid) -> Result<Vec<ImageJob>> {
        let jobs = sqlx::query_as::<_, ImageJob>(
            r#"
            SELECT ij.id, ij.user_plan_id, ij.original_image, ij.link_expires_in,
                   ij.created_at, ij.status
            FROM image_jobs ij
            JOIN user_plans up ON up.id = ij.user_plan_id
            WHERE up.user_id = $1
            ORDER BY ij.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    pub async fn thumbnails_for_job(&self, job_id: Uuid) -> Result<Vec<Thumbnail>> {
        let thumbnails = sqlx::query_as::<_, Thumbnail>(
            r#"
            SELECT id, image_job_id, image, height, external_id, external_id_expires_at
            FROM thumbnails
            WHERE image_job_id = $1
            ORDER BY height DESC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(thumbnails)
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn job_for_processing(&self, job_id: Uuid) -> Result<Option<JobForProcessing>> {
        let job = sqlx::query_as::<_, JobForProcessing>(
            r#"
            SELECT ij.id, up.plan_id, ij.original_image, ij.link_expires_in, ij.status
            FROM image_jobs ij
            JOIN user_plans up ON up.id = ij.user_plan_id
            WHERE ij.id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    async fn set_status(&self, job_id: Uuid, status: JobStatus) -> Result<()> {
        sqlx::query("UPDATE image_jobs SET status = $2 WHERE id = $1")
            .bind(job_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn complete(
        &self,
        job_id: Uuid,
        thumbnails: Vec<NewThumbnail>,
        clear_original: bool,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for thumbnail in &thumbnails {
            sqlx::query(
                r#"
                INSERT INTO thumbnails (id, image_job_id, image, height, external_id, external_id_expires_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(thumbnail.id)
            .bind(job_id)
            .bind(&thumbnail.image)
            .bind(thumbnail.height)
            .bind(thumbnail.external_id)
            .bind(thumbnail.external_id_expires_at)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            UPDATE image_jobs
            SET status = $2,
                original_image = CASE WHEN $3 THEN NULL ELSE original_image END
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(JobStatus::Done.as_str())
        .bind(clear_original)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn thumbnail_by_external_id(&self, external_id: Uuid) -> Result<Option<Thumbnail>> {
        let thumbnail = sqlx::query_as::<_, Thumbnail>(
            r#"
            SELECT id, image_job_id, image, height, external_id, external_id_expires_at
            FROM thumbnails
            WHERE external_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(thumbnail)
    }
}
