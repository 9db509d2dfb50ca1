//! External link resolver - maps an expiring external id to a blob location
//!
//! Consulted at read time by the serving layer. Expiry is evaluated on every
//! call; an expired link simply stops resolving, nothing is swept or deleted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::JobStore;
use crate::error::{AppError, Result};
use crate::storage::BlobStore;

pub struct ExternalLinkResolver {
    store: Arc<dyn JobStore>,
    blobs: Arc<dyn BlobStore>,
}

impl ExternalLinkResolver {
    pub fn new(store: Arc<dyn JobStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    /// Resolve an external id and requested format to a blob URL.
    ///
    /// Fails with `NotFound` for an unknown or unparseable id, a format that
    /// does not case-sensitively match the stored extension, or a link at or
    /// past its expiry instant.
    pub async fn resolve(&self, external_id: &str, requested_format: &str) -> Result<String> {
        self.resolve_at(external_id, requested_format, Utc::now())
            .await
    }

    pub async fn resolve_at(
        &self,
        external_id: &str,
        requested_format: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let external_id = Uuid::parse_str(external_id).map_err(|_| AppError::NotFound)?;

        let thumbnail = self
            .store
            .thumbnail_by_external_id(external_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if thumbnail.extension() != requested_format {
            return Err(AppError::NotFound);
        }
        if !thumbnail.has_live_external_link(now) {
            return Err(AppError::NotFound);
        }

        Ok(self.blobs.get_url(&thumbnail.image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Thumbnail, ThumbnailResponse};
    use crate::testing::{MemoryBlobStore, MemoryJobStore};
    use chrono::Duration;

    struct Harness {
        store: Arc<MemoryJobStore>,
        blobs: Arc<MemoryBlobStore>,
        resolver: ExternalLinkResolver,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryJobStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let resolver = ExternalLinkResolver::new(store.clone(), blobs.clone());
        Harness {
            store,
            blobs,
            resolver,
        }
    }

    fn seeded_thumbnail(
        h: &Harness,
        image: &str,
        expires_at: DateTime<Utc>,
    ) -> (Uuid, Thumbnail) {
        let external_id = Uuid::new_v4();
        let thumbnail = Thumbnail {
            id: Uuid::new_v4(),
            image_job_id: Uuid::new_v4(),
            image: image.to_string(),
            height: 200,
            external_id: Some(external_id),
            external_id_expires_at: Some(expires_at),
        };
        h.store.insert_thumbnail(thumbnail.clone());
        (external_id, thumbnail)
    }

    #[tokio::test]
    async fn resolves_live_link_to_blob_url() {
        let h = harness();
        let expires_at = Utc::now() + Duration::seconds(300);
        let (external_id, thumbnail) = seeded_thumbnail(&h, "thumbs/j/t_thumb_200.jpg", expires_at);

        let url = h
            .resolver
            .resolve(&external_id.to_string(), "jpg")
            .await
            .unwrap();
        assert_eq!(url, h.blobs.get_url(&thumbnail.image));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let h = harness();
        let err = h
            .resolver
            .resolve(&Uuid::new_v4().to_string(), "jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn malformed_id_is_not_found() {
        let h = harness();
        let err = h.resolver.resolve("not-a-uuid", "jpg").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn wrong_format_is_not_found() {
        let h = harness();
        let expires_at = Utc::now() + Duration::seconds(300);
        let (external_id, _) = seeded_thumbnail(&h, "thumbs/j/t_thumb_200.jpg", expires_at);

        let err = h
            .resolver
            .resolve(&external_id.to_string(), "png")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn format_match_is_case_sensitive() {
        let h = harness();
        let expires_at = Utc::now() + Duration::seconds(300);
        let (external_id, _) = seeded_thumbnail(&h, "thumbs/j/t_thumb_200.jpg", expires_at);

        let err = h
            .resolver
            .resolve(&external_id.to_string(), "JPG")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn link_stops_resolving_exactly_at_expiry() {
        let h = harness();
        let expires_at = Utc::now() + Duration::seconds(300);
        let (external_id, _) = seeded_thumbnail(&h, "thumbs/j/t_thumb_200.jpg", expires_at);
        let id = external_id.to_string();

        // strictly before the instant: live
        assert!(h
            .resolver
            .resolve_at(&id, "jpg", expires_at - Duration::seconds(1))
            .await
            .is_ok());

        // exactly at the instant: dead, not a <= edge
        let err = h
            .resolver
            .resolve_at(&id, "jpg", expires_at)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));

        // after the instant: dead
        let err = h
            .resolver
            .resolve_at(&id, "jpg", expires_at + Duration::seconds(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn resolver_and_serializer_agree_at_every_instant() {
        let h = harness();
        let expires_at = Utc::now() + Duration::seconds(300);
        let (external_id, thumbnail) = seeded_thumbnail(&h, "thumbs/j/t_thumb_200.jpg", expires_at);
        let id = external_id.to_string();

        for now in [
            expires_at - Duration::seconds(300),
            expires_at - Duration::milliseconds(1),
            expires_at,
            expires_at + Duration::milliseconds(1),
            expires_at + Duration::days(1),
        ] {
            let resolved = h.resolver.resolve_at(&id, "jpg", now).await.is_ok();
            let serialized =
                ThumbnailResponse::from_thumbnail(&thumbnail, h.blobs.as_ref(), "http://x", now)
                    .external_url
                    .is_some();
            assert_eq!(resolved, serialized, "disagreement at {now}");
        }
    }
}
