/// Data models for thumbnail-service
///
/// This module defines structures for:
/// - Plan / ThumbnailSize: subscription plans and their configured heights
/// - UserPlan: the single plan bound to a user
/// - ImageJob: one user-submitted image and its processing status
/// - Thumbnail: a generated, immutable resize of a job's original image
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::storage::BlobStore;

/// File extensions accepted for uploaded originals (matched case-insensitively)
pub const ALLOWED_UPLOAD_EXTENSIONS: [&str; 3] = ["png", "jpeg", "jpg"];

/// Extension of the last path segment, without the dot ("" when absent)
pub fn file_extension(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

// ========================================
// Job status
// ========================================

/// Image job status in the processing lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    New,
    Pending,
    Done,
    Error,
}

impl JobStatus {
    /// Literal code persisted in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "N",
            Self::Pending => "P",
            Self::Done => "D",
            Self::Error => "E",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "N" => Some(Self::New),
            "P" => Some(Self::Pending),
            "D" => Some(Self::Done),
            "E" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Legal transitions of one processing attempt: N -> P -> {D, E}.
    /// Re-dispatch of a terminal job is an explicit operator decision made
    /// outside this predicate.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::Pending)
                | (Self::Pending, Self::Done)
                | (Self::Pending, Self::Error)
        )
    }
}

// ========================================
// Entities
// ========================================

/// Subscription plan controlling thumbnail heights and feature flags
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Plan {
    pub id: Uuid,
    pub title: String,
    pub keeping_original_image: bool,
    pub expiring_link: bool,
}

/// One configured thumbnail height of a plan (duplicates permitted)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ThumbnailSize {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub height: i32,
}

/// Binding of a user to exactly one plan at a time
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserPlan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
}

/// Image job database entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImageJob {
    pub id: Uuid,
    pub user_plan_id: Uuid,
    /// Blob key of the uploaded original; cleared after processing unless the
    /// plan retains originals
    pub original_image: Option<String>,
    pub link_expires_in: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub status: String,
}

impl ImageJob {
    pub fn get_status(&self) -> JobStatus {
        JobStatus::from_str(&self.status).unwrap_or(JobStatus::New)
    }
}

/// Generated thumbnail database entity; never mutated after insert
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Thumbnail {
    pub id: Uuid,
    pub image_job_id: Uuid,
    pub image: String,
    pub height: i32,
    pub external_id: Option<Uuid>,
    pub external_id_expires_at: Option<DateTime<Utc>>,
}

impl Thumbnail {
    /// Single expiry predicate shared by the external link resolver and the
    /// read-side serializer; the two call sites must never disagree. A link
    /// is live only while `now` is strictly before the expiry instant, so it
    /// stops resolving exactly at that instant.
    pub fn has_live_external_link(&self, now: DateTime<Utc>) -> bool {
        match (self.external_id, self.external_id_expires_at) {
            (Some(_), Some(expires_at)) => now < expires_at,
            _ => false,
        }
    }

    pub fn extension(&self) -> &str {
        file_extension(&self.image)
    }
}

/// Row data for the bulk thumbnail insert performed on job completion
#[derive(Debug, Clone)]
pub struct NewThumbnail {
    pub id: Uuid,
    pub image: String,
    pub height: i32,
    pub external_id: Option<Uuid>,
    pub external_id_expires_at: Option<DateTime<Utc>>,
}

// ========================================
// Requests
// ========================================

/// Create image job request DTO, validated before the job row is written
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateImageJobRequest {
    /// Blob key the original was uploaded under
    pub original_image: String,
    #[validate(range(min = 300, max = 30000))]
    pub link_expires_in: Option<i32>,
}

impl CreateImageJobRequest {
    pub fn validate_request(&self) -> Result<()> {
        self.validate()
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;

        let ext = file_extension(&self.original_image);
        if !ALLOWED_UPLOAD_EXTENSIONS
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        {
            return Err(AppError::InvalidInput(format!(
                "file extension '{ext}' is not allowed"
            )));
        }
        Ok(())
    }
}

// ========================================
// Response DTOs
// ========================================

/// Read-side view of a thumbnail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailResponse {
    pub image_url: String,
    pub external_url: Option<String>,
    pub external_url_expires_at: Option<DateTime<Utc>>,
}

impl ThumbnailResponse {
    pub fn from_thumbnail(
        thumbnail: &Thumbnail,
        blobs: &dyn BlobStore,
        public_base_url: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let external_url = if thumbnail.has_live_external_link(now) {
            thumbnail.external_id.map(|external_id| {
                format!(
                    "{}/image/{}.{}",
                    public_base_url.trim_end_matches('/'),
                    external_id,
                    thumbnail.extension()
                )
            })
        } else {
            None
        };

        Self {
            image_url: blobs.get_url(&thumbnail.image),
            external_url,
            external_url_expires_at: thumbnail.external_id_expires_at,
        }
    }
}

/// Read-side view of an image job with its thumbnails
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageJobResponse {
    pub id: Uuid,
    pub thumbnails: Vec<ThumbnailResponse>,
    pub status: String,
    pub original_image: Option<String>,
}

impl ImageJobResponse {
    pub fn from_job(
        job: &ImageJob,
        thumbnails: &[Thumbnail],
        blobs: &dyn BlobStore,
        public_base_url: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: job.id,
            thumbnails: thumbnails
                .iter()
                .map(|t| ThumbnailResponse::from_thumbnail(t, blobs, public_base_url, now))
                .collect(),
            status: job.status.clone(),
            original_image: job.original_image.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryBlobStore;
    use chrono::Duration;

    fn thumbnail(external: Option<(Uuid, DateTime<Utc>)>) -> Thumbnail {
        Thumbnail {
            id: Uuid::new_v4(),
            image_job_id: Uuid::new_v4(),
            image: "thumbs/job/abc_thumb_200.jpg".to_string(),
            height: 200,
            external_id: external.map(|(id, _)| id),
            external_id_expires_at: external.map(|(_, at)| at),
        }
    }

    #[test]
    fn status_codes_match_persisted_literals() {
        assert_eq!(JobStatus::New.as_str(), "N");
        assert_eq!(JobStatus::Pending.as_str(), "P");
        assert_eq!(JobStatus::Done.as_str(), "D");
        assert_eq!(JobStatus::Error.as_str(), "E");
        for status in [
            JobStatus::New,
            JobStatus::Pending,
            JobStatus::Done,
            JobStatus::Error,
        ] {
            assert_eq!(JobStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::from_str("X"), None);
    }

    #[test]
    fn only_forward_transitions_are_legal() {
        use JobStatus::*;
        assert!(New.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Done));
        assert!(Pending.can_transition_to(Error));

        assert!(!Pending.can_transition_to(Pending));
        assert!(!New.can_transition_to(Done));
        assert!(!New.can_transition_to(Error));
        assert!(!Done.can_transition_to(Pending));
        assert!(!Error.can_transition_to(Pending));
        assert!(Done.is_terminal());
        assert!(Error.is_terminal());
    }

    #[test]
    fn external_link_dies_exactly_at_expiry() {
        let expires_at = Utc::now();
        let t = thumbnail(Some((Uuid::new_v4(), expires_at)));

        assert!(t.has_live_external_link(expires_at - Duration::seconds(1)));
        assert!(!t.has_live_external_link(expires_at));
        assert!(!t.has_live_external_link(expires_at + Duration::seconds(1)));
    }

    #[test]
    fn external_link_requires_both_fields() {
        let now = Utc::now();
        assert!(!thumbnail(None).has_live_external_link(now));

        let mut half = thumbnail(None);
        half.external_id = Some(Uuid::new_v4());
        assert!(!half.has_live_external_link(now));

        let mut other_half = thumbnail(None);
        other_half.external_id_expires_at = Some(now + Duration::seconds(60));
        assert!(!other_half.has_live_external_link(now));
    }

    #[test]
    fn file_extension_handles_paths() {
        assert_eq!(file_extension("original/photo.jpg"), "jpg");
        assert_eq!(file_extension("a.b/photo.jpeg"), "jpeg");
        assert_eq!(file_extension("photo"), "");
        assert_eq!(file_extension("thumbs/x_thumb_200.PNG"), "PNG");
    }

    #[test]
    fn create_request_validates_expiry_range() {
        let ok = CreateImageJobRequest {
            original_image: "original/photo.jpg".to_string(),
            link_expires_in: Some(300),
        };
        assert!(ok.validate_request().is_ok());

        let missing = CreateImageJobRequest {
            original_image: "original/photo.png".to_string(),
            link_expires_in: None,
        };
        assert!(missing.validate_request().is_ok());

        for bad in [299, 30001, 0, -5] {
            let req = CreateImageJobRequest {
                original_image: "original/photo.jpg".to_string(),
                link_expires_in: Some(bad),
            };
            assert!(req.validate_request().is_err(), "expected {bad} rejected");
        }
    }

    #[test]
    fn create_request_validates_extension() {
        let gif = CreateImageJobRequest {
            original_image: "original/photo.gif".to_string(),
            link_expires_in: None,
        };
        assert!(gif.validate_request().is_err());

        // extension matching is case-insensitive at upload time
        let upper = CreateImageJobRequest {
            original_image: "original/photo.PNG".to_string(),
            link_expires_in: None,
        };
        assert!(upper.validate_request().is_ok());
    }

    #[test]
    fn thumbnail_response_builds_external_url_while_live() {
        let blobs = MemoryBlobStore::new();
        let external_id = Uuid::new_v4();
        let expires_at = Utc::now() + Duration::seconds(300);
        let t = thumbnail(Some((external_id, expires_at)));

        let live = ThumbnailResponse::from_thumbnail(
            &t,
            &blobs,
            "https://api.example.com/",
            expires_at - Duration::seconds(1),
        );
        assert_eq!(
            live.external_url.as_deref(),
            Some(format!("https://api.example.com/image/{external_id}.jpg").as_str())
        );
        assert_eq!(live.external_url_expires_at, Some(expires_at));
        assert!(live.image_url.ends_with("thumbs/job/abc_thumb_200.jpg"));

        let expired =
            ThumbnailResponse::from_thumbnail(&t, &blobs, "https://api.example.com", expires_at);
        assert!(expired.external_url.is_none());
        // the raw timestamp stays visible even after expiry
        assert_eq!(expired.external_url_expires_at, Some(expires_at));
    }

    #[test]
    fn job_response_carries_literal_status_code() {
        let blobs = MemoryBlobStore::new();
        let job = ImageJob {
            id: Uuid::new_v4(),
            user_plan_id: Uuid::new_v4(),
            original_image: None,
            link_expires_in: None,
            created_at: Utc::now(),
            status: "D".to_string(),
        };
        let response = ImageJobResponse::from_job(&job, &[], &blobs, "http://x", Utc::now());
        assert_eq!(response.status, "D");
        assert!(response.thumbnails.is_empty());
        assert!(response.original_image.is_none());
    }
}
