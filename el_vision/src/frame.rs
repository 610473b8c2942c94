//! ABOUTME: Decoded frame and clip handle value types shared across the pipeline
//! ABOUTME: Frames are immutable, cheap to clone, and cache their colour histogram lazily

use bytes::Bytes;
use el_core::{Error, Result};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, RgbImage};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::histogram::Histogram;

/// One decoded still from a clip plus its capture offset
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<RgbImage>,
    timestamp_offset: Duration,
    histogram: Arc<OnceLock<Histogram>>,
}

impl Frame {
    /// Wrap a decoded raster captured `timestamp_offset` after clip start
    pub fn new(image: RgbImage, timestamp_offset: Duration) -> Self {
        Self {
            image: Arc::new(image),
            timestamp_offset,
            histogram: Arc::new(OnceLock::new()),
        }
    }

    /// Build a frame from any decoded image, converting to RGB8
    pub fn from_dynamic(image: DynamicImage, timestamp_offset: Duration) -> Self {
        Self::new(image.to_rgb8(), timestamp_offset)
    }

    /// Decode JPEG/PNG bytes into a frame
    pub fn decode(data: &[u8], timestamp_offset: Duration) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|e| Error::Validation(format!("Failed to decode frame: {}", e)))?;
        Ok(Self::from_dynamic(img, timestamp_offset))
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn timestamp_offset(&self) -> Duration {
        self.timestamp_offset
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Colour histogram with `bins_per_channel` bins per RGB channel
    ///
    /// The first histogram computed is cached and shared by every clone of
    /// this frame. A request for a different bin count is computed fresh.
    pub fn histogram(&self, bins_per_channel: u32) -> Cow<'_, Histogram> {
        let cached = self
            .histogram
            .get_or_init(|| Histogram::from_rgb(&self.image, bins_per_channel));

        if cached.bins_per_channel() == bins_per_channel {
            Cow::Borrowed(cached)
        } else {
            Cow::Owned(Histogram::from_rgb(&self.image, bins_per_channel))
        }
    }

    /// Encode as JPEG, downscaling so neither side exceeds `max_dimension`
    pub fn encode_jpeg(&self, quality: u8, max_dimension: u32) -> Result<Bytes> {
        let quality = quality.clamp(1, 100);
        let (width, height) = self.image.dimensions();
        let longest = width.max(height);

        let resized;
        let source: &RgbImage = if max_dimension > 0 && longest > max_dimension {
            let scale = max_dimension as f64 / longest as f64;
            let target_w = ((width as f64 * scale).round() as u32).max(1);
            let target_h = ((height as f64 * scale).round() as u32).max(1);
            resized = image::imageops::resize(
                &*self.image,
                target_w,
                target_h,
                FilterType::Triangle,
            );
            &resized
        } else {
            &*self.image
        };

        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, quality)
            .encode_image(source)
            .map_err(|e| Error::Validation(format!("Failed to encode JPEG: {}", e)))?;

        Ok(Bytes::from(buffer))
    }
}

/// Opaque reference to a recorded clip on local storage
#[derive(Debug, Clone, PartialEq)]
pub struct ClipHandle {
    pub path: PathBuf,
    pub duration: Option<Duration>,
    pub size_bytes: Option<u64>,
    pub mime_type: String,
    pub has_audio: bool,
}

impl ClipHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            duration: None,
            size_bytes: None,
            mime_type: "video/mp4".to_string(),
            has_audio: false,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_size_bytes(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_audio(mut self, has_audio: bool) -> Self {
        self.has_audio = has_audio;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clip size in megabytes, when known
    pub fn size_mb(&self) -> Option<f64> {
        self.size_bytes.map(|b| b as f64 / (1024.0 * 1024.0))
    }
}
