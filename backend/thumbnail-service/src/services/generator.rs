//! Thumbnail generator - produces one encoded image per configured height
//!
//! Heights arrive largest-first and one working copy is reused: each resize
//! operates on the already-shrunk result of the previous step (progressive
//! downscale), not on the original. Output dimensions match an independent
//! resize from the original; pixel content may differ slightly because
//! resampling is lossy. The `resize_from_original` flag switches to
//! independent resizes.
//!
//! CPU-intensive; call through `generate_async` from async code.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageOutputFormat};
use tracing::debug;

use crate::error::{AppError, Result};

/// Supported image container formats; thumbnails are encoded in the same
/// format as the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    fn format(&self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
        }
    }
}

/// Configuration for thumbnail generation
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    /// JPEG quality (0-100)
    pub jpeg_quality: u8,
    /// Resize every height from the pristine original instead of chaining
    pub resize_from_original: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 85,
            resize_from_original: false,
        }
    }
}

/// One generated thumbnail
#[derive(Debug)]
pub struct GeneratedThumbnail {
    /// Encoded image data, same container format as the input
    pub data: Bytes,
    pub width: u32,
    /// The requested target height
    pub height: u32,
}

/// Thumbnail generator
pub struct ThumbnailGenerator {
    config: GeneratorConfig,
}

impl ThumbnailGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(GeneratorConfig::default())
    }

    /// Generate one thumbnail per target height (blocking version)
    ///
    /// `heights` must be ordered descending; an empty slice produces an empty
    /// result.
    pub fn generate(
        &self,
        original: &[u8],
        kind: ImageKind,
        heights: &[u32],
    ) -> Result<Vec<GeneratedThumbnail>> {
        if heights.contains(&0) {
            return Err(AppError::InvalidThumbnailSpec(
                "target height must be positive".to_string(),
            ));
        }

        let mut current = image::load_from_memory_with_format(original, kind.format())
            .map_err(|e| AppError::UnsupportedFormat(e.to_string()))?;

        let (orig_w, orig_h) = current.dimensions();
        debug!(
            original_width = orig_w,
            original_height = orig_h,
            targets = heights.len(),
            "generating thumbnails"
        );

        let mut thumbnails = Vec::with_capacity(heights.len());
        for &height in heights {
            let (w, h) = current.dimensions();
            let width = scaled_width(w, h, height).max(1);

            let resized = current.resize_exact(width, height, FilterType::Lanczos3);
            let data = self.encode(&resized, kind)?;
            thumbnails.push(GeneratedThumbnail {
                data,
                width,
                height,
            });

            if !self.config.resize_from_original {
                // next, smaller height resizes the already-shrunk copy
                current = resized;
            }
        }

        Ok(thumbnails)
    }

    /// Generate thumbnails on the blocking thread pool
    pub async fn generate_async(
        self: Arc<Self>,
        original: Bytes,
        kind: ImageKind,
        heights: Vec<u32>,
    ) -> Result<Vec<GeneratedThumbnail>> {
        tokio::task::spawn_blocking(move || self.generate(&original, kind, &heights))
            .await
            .map_err(|e| AppError::Internal(format!("thumbnail task panicked: {e}")))?
    }

    fn encode(&self, img: &DynamicImage, kind: ImageKind) -> Result<Bytes> {
        let mut buf = Vec::new();
        let mut cursor = Cursor::new(&mut buf);

        let format = match kind {
            ImageKind::Jpeg => ImageOutputFormat::Jpeg(self.config.jpeg_quality),
            ImageKind::Png => ImageOutputFormat::Png,
        };
        img.write_to(&mut cursor, format)
            .map_err(|e| AppError::UnsupportedFormat(format!("encoding failed: {e}")))?;

        Ok(Bytes::from(buf))
    }
}

/// Width preserving the working copy's aspect ratio at the target height
fn scaled_width(width: u32, height: u32, target_height: u32) -> u32 {
    (f64::from(width) * f64::from(target_height) / f64::from(height)).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::encoded_image;

    fn dimensions_of(data: &[u8], kind: ImageKind) -> (u32, u32) {
        let img = image::load_from_memory_with_format(data, kind.format()).expect("decodable");
        img.dimensions()
    }

    #[test]
    fn scaled_width_rounds() {
        assert_eq!(scaled_width(800, 600, 200), 267);
        assert_eq!(scaled_width(800, 600, 400), 533);
        assert_eq!(scaled_width(1000, 1000, 250), 250);
    }

    #[test]
    fn single_height_matches_aspect_ratio() {
        let generator = ThumbnailGenerator::with_defaults();
        let source = encoded_image(800, 600, ImageKind::Jpeg);

        let thumbnails = generator.generate(&source, ImageKind::Jpeg, &[200]).unwrap();

        assert_eq!(thumbnails.len(), 1);
        assert_eq!((thumbnails[0].width, thumbnails[0].height), (267, 200));
        assert_eq!(dimensions_of(&thumbnails[0].data, ImageKind::Jpeg), (267, 200));
    }

    #[test]
    fn progressive_downscale_chains_off_previous_result() {
        let generator = ThumbnailGenerator::with_defaults();
        let source = encoded_image(800, 600, ImageKind::Jpeg);

        let thumbnails = generator
            .generate(&source, ImageKind::Jpeg, &[400, 200])
            .unwrap();

        assert_eq!(thumbnails.len(), 2);
        assert_eq!((thumbnails[0].width, thumbnails[0].height), (533, 400));
        // second step scales the 533x400 working copy, not the 800x600 source
        assert_eq!((thumbnails[1].width, thumbnails[1].height), (267, 200));
        assert_eq!(dimensions_of(&thumbnails[1].data, ImageKind::Jpeg), (267, 200));
    }

    #[test]
    fn both_modes_agree_on_dimensions() {
        let cases: [(u32, u32, &[u32]); 3] = [
            (800, 600, &[400, 200]),
            (1024, 768, &[500, 300, 100]),
            (640, 480, &[480, 240, 120]),
        ];

        for (w, h, heights) in cases {
            let source = encoded_image(w, h, ImageKind::Png);
            let chained = ThumbnailGenerator::with_defaults()
                .generate(&source, ImageKind::Png, heights)
                .unwrap();
            let independent = ThumbnailGenerator::new(GeneratorConfig {
                resize_from_original: true,
                ..GeneratorConfig::default()
            })
            .generate(&source, ImageKind::Png, heights)
            .unwrap();

            let chained_dims: Vec<_> = chained.iter().map(|t| (t.width, t.height)).collect();
            let independent_dims: Vec<_> =
                independent.iter().map(|t| (t.width, t.height)).collect();
            assert_eq!(chained_dims, independent_dims, "source {w}x{h}");
        }
    }

    #[test]
    fn duplicate_heights_each_produce_a_thumbnail() {
        let generator = ThumbnailGenerator::with_defaults();
        let source = encoded_image(400, 400, ImageKind::Png);

        let thumbnails = generator
            .generate(&source, ImageKind::Png, &[200, 200])
            .unwrap();

        assert_eq!(thumbnails.len(), 2);
        assert!(thumbnails.iter().all(|t| t.height == 200 && t.width == 200));
    }

    #[test]
    fn empty_heights_produce_nothing() {
        let generator = ThumbnailGenerator::with_defaults();
        let source = encoded_image(100, 100, ImageKind::Jpeg);

        let thumbnails = generator.generate(&source, ImageKind::Jpeg, &[]).unwrap();
        assert!(thumbnails.is_empty());
    }

    #[test]
    fn zero_height_is_rejected() {
        let generator = ThumbnailGenerator::with_defaults();
        let source = encoded_image(100, 100, ImageKind::Jpeg);

        let err = generator
            .generate(&source, ImageKind::Jpeg, &[200, 0])
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidThumbnailSpec(_)));
    }

    #[test]
    fn undecodable_input_is_rejected() {
        let generator = ThumbnailGenerator::with_defaults();

        let err = generator
            .generate(b"definitely not an image", ImageKind::Jpeg, &[200])
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat(_)));
    }

    #[test]
    fn output_container_format_matches_input() {
        let generator = ThumbnailGenerator::with_defaults();

        let png = encoded_image(300, 300, ImageKind::Png);
        let out = generator.generate(&png, ImageKind::Png, &[100]).unwrap();
        assert_eq!(
            image::guess_format(&out[0].data).unwrap(),
            ImageFormat::Png
        );

        let jpeg = encoded_image(300, 300, ImageKind::Jpeg);
        let out = generator.generate(&jpeg, ImageKind::Jpeg, &[100]).unwrap();
        assert_eq!(
            image::guess_format(&out[0].data).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn target_larger_than_source_upscales() {
        let generator = ThumbnailGenerator::with_defaults();
        let source = encoded_image(100, 80, ImageKind::Png);

        let thumbnails = generator.generate(&source, ImageKind::Png, &[200]).unwrap();
        assert_eq!((thumbnails[0].width, thumbnails[0].height), (250, 200));
    }

    #[test]
    fn kind_from_extension() {
        assert_eq!(ImageKind::from_extension("jpg"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_extension("jpeg"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_extension("PNG"), Some(ImageKind::Png));
        assert_eq!(ImageKind::from_extension("gif"), None);
        assert_eq!(ImageKind::from_extension(""), None);
    }
}
