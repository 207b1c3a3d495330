// Frame sources: where the classification loop pulls its "current frame" from

use crate::models::capture::{CaptureError, CaptureResult, PixelFormat, RawFrame};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Pollable supplier of the current video frame
#[async_trait]
pub trait FrameSource: Send {
    /// Frame to classify this cycle
    async fn current_frame(&mut self) -> CaptureResult<RawFrame>;
}

/// Serves the same frame forever
pub struct StaticFrameSource {
    frame: RawFrame,
}

impl StaticFrameSource {
    pub fn new(frame: RawFrame) -> Self {
        Self { frame }
    }
}

#[async_trait]
impl FrameSource for StaticFrameSource {
    async fn current_frame(&mut self) -> CaptureResult<RawFrame> {
        let mut frame = self.frame.clone();
        frame.timestamp = chrono::Utc::now().timestamp_millis();
        Ok(frame)
    }
}

/// Replays still images from a directory in file-name order, looping at the end
pub struct DirectoryFrameSource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl DirectoryFrameSource {
    const EXTENSIONS: [&'static str; 3] = ["png", "jpg", "jpeg"];

    pub fn open(dir: &Path) -> CaptureResult<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && Self::is_image(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(CaptureError::NoFrames(dir.display().to_string()));
        }

        tracing::info!("Replaying {} frame(s) from {}", paths.len(), dir.display());
        Ok(Self { paths, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| Self::EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    fn load(path: &Path) -> CaptureResult<RawFrame> {
        let image = image::open(path)?.to_rgba8();
        Ok(RawFrame {
            timestamp: chrono::Utc::now().timestamp_millis(),
            width: image.width(),
            height: image.height(),
            data: image.into_raw(),
            format: PixelFormat::RGBA8,
        })
    }
}

#[async_trait]
impl FrameSource for DirectoryFrameSource {
    async fn current_frame(&mut self) -> CaptureResult<RawFrame> {
        let path = self.paths[self.next].clone();
        self.next = (self.next + 1) % self.paths.len();

        tokio::task::spawn_blocking(move || Self::load(&path))
            .await
            .map_err(|e| CaptureError::ReadFailed(e.to_string()))?
    }
}
