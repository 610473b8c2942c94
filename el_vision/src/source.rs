//! ABOUTME: Frame sources that turn a clip handle into decoded candidate frames
//! ABOUTME: Ships an in-memory source and a directory-of-stills source keyed by millisecond offset

use async_trait::async_trait;
use futures_util::future::join_all;
use el_core::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

use crate::frame::{ClipHandle, Frame};

/// Produces decoded frames for a clip, starting at `offset_ms` into it
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn extract(&self, clip: &ClipHandle, offset_ms: u64) -> Result<Vec<Frame>>;
}

/// Frames registered per clip path, served from memory
#[derive(Debug, Clone, Default)]
pub struct MemoryFrameSource {
    clips: Arc<RwLock<HashMap<PathBuf, Vec<Frame>>>>,
}

impl MemoryFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the frames for a clip path, replacing any earlier set
    pub fn insert(&self, path: impl Into<PathBuf>, frames: Vec<Frame>) {
        if let Ok(mut clips) = self.clips.write() {
            clips.insert(path.into(), frames);
        }
    }

    pub fn with_clip(self, path: impl Into<PathBuf>, frames: Vec<Frame>) -> Self {
        self.insert(path, frames);
        self
    }
}

#[async_trait]
impl FrameSource for MemoryFrameSource {
    async fn extract(&self, clip: &ClipHandle, offset_ms: u64) -> Result<Vec<Frame>> {
        let clips = self
            .clips
            .read()
            .map_err(|_| Error::External("Frame store lock poisoned".to_string()))?;

        let frames = clips
            .get(clip.path())
            .ok_or_else(|| Error::NotFound(format!("No frames for clip {}", clip.path().display())))?;

        let offset = Duration::from_millis(offset_ms);
        Ok(frames
            .iter()
            .filter(|f| f.timestamp_offset() >= offset)
            .cloned()
            .collect())
    }
}

/// Treats the clip path as a directory of pre-extracted stills
///
/// Each file is named `<offset_ms>.jpg` (or `.jpeg`/`.png`). Files whose stem
/// is not an integer, or that fail to decode, are skipped with a warning.
#[derive(Debug, Clone, Default)]
pub struct ImageDirFrameSource;

impl ImageDirFrameSource {
    pub fn new() -> Self {
        Self
    }

    fn offset_for(path: &Path) -> Option<u64> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        if !matches!(extension.as_str(), "jpg" | "jpeg" | "png") {
            return None;
        }
        path.file_stem()?.to_str()?.parse().ok()
    }
}

#[async_trait]
impl FrameSource for ImageDirFrameSource {
    async fn extract(&self, clip: &ClipHandle, offset_ms: u64) -> Result<Vec<Frame>> {
        let dir = clip.path();
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(format!("Clip directory {} does not exist", dir.display()))
            } else {
                Error::Io(e)
            }
        })?;

        let mut stills: Vec<(u64, PathBuf)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            match Self::offset_for(&path) {
                Some(offset) if offset >= offset_ms => stills.push((offset, path)),
                Some(_) => {}
                None => debug!(file = %path.display(), "Ignoring non-frame file"),
            }
        }
        stills.sort_by_key(|(offset, _)| *offset);

        // Decode concurrently; join_all keeps the offset order
        let decodes = stills.into_iter().map(|(offset, path)| async move {
            let data = tokio::fs::read(&path).await?;
            let decoded = tokio::task::spawn_blocking(move || {
                Frame::decode(&data, Duration::from_millis(offset))
            })
            .await
            .map_err(|e| Error::External(format!("Frame decode task failed: {}", e)))?;
            Ok::<_, Error>((path, decoded))
        });

        let mut frames = Vec::new();
        for outcome in join_all(decodes).await {
            let (path, decoded) = outcome?;
            match decoded {
                Ok(frame) => frames.push(frame),
                Err(e) => warn!(file = %path.display(), error = %e, "Skipping undecodable frame"),
            }
        }

        debug!(clip = %dir.display(), frames = frames.len(), "Extracted frames from directory");
        Ok(frames)
    }
}
