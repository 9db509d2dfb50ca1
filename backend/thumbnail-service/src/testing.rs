//! In-memory doubles and fixtures shared by the unit tests

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use uuid::Uuid;

use crate::db::{JobForProcessing, JobStore, PlanCatalog};
use crate::error::{AppError, Result};
use crate::models::{JobStatus, NewThumbnail, Thumbnail};
use crate::services::generator::ImageKind;
use crate::storage::BlobStore;

/// Encode a solid-color image of the given dimensions
pub fn encoded_image(width: u32, height: u32, kind: ImageKind) -> Bytes {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
        width,
        height,
        image::Rgb([90, 120, 150]),
    ));
    let mut buf = Vec::new();
    let format = match kind {
        ImageKind::Jpeg => ImageOutputFormat::Jpeg(85),
        ImageKind::Png => ImageOutputFormat::Png,
    };
    img.write_to(&mut Cursor::new(&mut buf), format)
        .expect("test image encodes");
    Bytes::from(buf)
}

// ========================================
// Plan catalog fixture
// ========================================

pub struct FixturePlan {
    pub heights: Vec<u32>,
    pub keeping_original_image: bool,
    pub expiring_link: bool,
}

pub struct FixtureCatalog {
    plans: HashMap<Uuid, FixturePlan>,
}

impl FixtureCatalog {
    pub fn with_plan(plan_id: Uuid, plan: FixturePlan) -> Self {
        let mut plans = HashMap::new();
        plans.insert(plan_id, plan);
        Self { plans }
    }

    fn plan(&self, plan_id: Uuid) -> Result<&FixturePlan> {
        self.plans
            .get(&plan_id)
            .ok_or_else(|| AppError::Internal(format!("fixture has no plan {plan_id}")))
    }
}

#[async_trait]
impl PlanCatalog for FixtureCatalog {
    async fn sizes_for(&self, plan_id: Uuid) -> Result<Vec<u32>> {
        let mut heights = self.plan(plan_id)?.heights.clone();
        heights.sort_unstable_by(|a, b| b.cmp(a));
        Ok(heights)
    }

    async fn allows_retain(&self, plan_id: Uuid) -> Result<bool> {
        Ok(self.plan(plan_id)?.keeping_original_image)
    }

    async fn allows_expiring_link(&self, plan_id: Uuid) -> Result<bool> {
        Ok(self.plan(plan_id)?.expiring_link)
    }
}

// ========================================
// Blob store double
// ========================================

pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, key: &str, data: Bytes) {
        self.blobs.lock().unwrap().insert(key.to_string(), data);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(key)
    }

    pub fn get_blob(&self, key: &str) -> Option<Bytes> {
        self.blobs.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Bytes> {
        self.get_blob(key)
            .ok_or_else(|| AppError::Storage(format!("no blob under '{key}'")))
    }

    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<String> {
        self.insert(key, data);
        Ok(self.get_url(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.blobs.lock().unwrap().remove(key);
        Ok(())
    }

    fn get_url(&self, key: &str) -> String {
        format!("https://blobs.test/{key}")
    }
}

// ========================================
// Job store double
// ========================================

#[derive(Default)]
struct MemoryJobState {
    jobs: HashMap<Uuid, JobForProcessing>,
    thumbnails: Vec<Thumbnail>,
    status_log: HashMap<Uuid, Vec<JobStatus>>,
}

pub struct MemoryJobStore {
    state: Mutex<MemoryJobState>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryJobState::default()),
        }
    }

    pub fn insert_job(&self, job: JobForProcessing) {
        self.state.lock().unwrap().jobs.insert(job.id, job);
    }

    pub fn insert_thumbnail(&self, thumbnail: Thumbnail) {
        self.state.lock().unwrap().thumbnails.push(thumbnail);
    }

    pub fn job(&self, job_id: Uuid) -> Option<JobForProcessing> {
        self.state.lock().unwrap().jobs.get(&job_id).cloned()
    }

    pub fn thumbnails(&self, job_id: Uuid) -> Vec<Thumbnail> {
        self.state
            .lock()
            .unwrap()
            .thumbnails
            .iter()
            .filter(|t| t.image_job_id == job_id)
            .cloned()
            .collect()
    }

    /// Every status persisted for the job, in write order
    pub fn status_log(&self, job_id: Uuid) -> Vec<JobStatus> {
        self.state
            .lock()
            .unwrap()
            .status_log
            .get(&job_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn job_for_processing(&self, job_id: Uuid) -> Result<Option<JobForProcessing>> {
        Ok(self.job(job_id))
    }

    async fn set_status(&self, job_id: Uuid, status: JobStatus) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::Internal(format!("no job {job_id} in store")))?;
        job.status = status.as_str().to_string();
        state.status_log.entry(job_id).or_default().push(status);
        Ok(())
    }

    async fn complete(
        &self,
        job_id: Uuid,
        thumbnails: Vec<NewThumbnail>,
        clear_original: bool,
    ) -> Result<()> {
        // one lock guards the whole write, mirroring the real transaction
        let mut state = self.state.lock().unwrap();
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::Internal(format!("no job {job_id} in store")))?;

        job.status = JobStatus::Done.as_str().to_string();
        if clear_original {
            job.original_image = None;
        }

        for t in thumbnails {
            state.thumbnails.push(Thumbnail {
                id: t.id,
                image_job_id: job_id,
                image: t.image,
                height: t.height,
                external_id: t.external_id,
                external_id_expires_at: t.external_id_expires_at,
            });
        }
        state
            .status_log
            .entry(job_id)
            .or_default()
            .push(JobStatus::Done);
        Ok(())
    }

    async fn thumbnail_by_external_id(&self, external_id: Uuid) -> Result<Option<Thumbnail>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .thumbnails
            .iter()
            .find(|t| t.external_id == Some(external_id))
            .cloned())
    }
}
