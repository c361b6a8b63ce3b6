//! Frame sources for analysis sessions.
//!
//! Camera capture itself lives outside this crate; hosts push frames through
//! [`ChannelFrameSource`] or point a session at a directory of stills.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::detector::Frame;
use crate::error::{MediaError, MediaResult};

/// Image extensions accepted by [`DirectoryFrameSource`].
pub const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Supplies the frame to analyze on each tick.
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` once the source is exhausted.
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// Image files from a directory, in lexical file-name order.
#[derive(Debug)]
pub struct DirectoryFrameSource {
    name: String,
    paths: Vec<PathBuf>,
    cursor: usize,
    looping: bool,
}

impl DirectoryFrameSource {
    /// List the frames in `dir`. Fails if the directory holds no images.
    pub fn open(dir: &Path, looping: bool) -> MediaResult<Self> {
        if !dir.is_dir() {
            return Err(MediaError::FileNotFound(dir.to_path_buf()));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_frame_file(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(MediaError::frame_source(format!(
                "No image frames in {}",
                dir.display()
            )));
        }

        debug!(dir = %dir.display(), frames = paths.len(), looping, "Opened frame directory");
        Ok(Self {
            name: format!("directory:{}", dir.display()),
            paths,
            cursor: 0,
            looping,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[async_trait]
impl FrameSource for DirectoryFrameSource {
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        if self.cursor >= self.paths.len() {
            if !self.looping {
                return Ok(None);
            }
            self.cursor = 0;
        }
        let path = self.paths[self.cursor].clone();
        self.cursor += 1;

        let frame = tokio::task::spawn_blocking(move || image::open(&path).map(|img| img.to_rgb8()))
            .await
            .map_err(|e| MediaError::internal(format!("Frame decode task failed: {e}")))??;
        Ok(Some(frame))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Frames pushed by a capture task over a channel.
///
/// Each call waits for at least one frame, then drops any backlog and keeps
/// only the most recent one. The source ends when every sender is dropped.
#[derive(Debug)]
pub struct ChannelFrameSource {
    rx: mpsc::Receiver<Frame>,
}

impl ChannelFrameSource {
    pub fn new(rx: mpsc::Receiver<Frame>) -> Self {
        Self { rx }
    }

    /// Create a source and the sender a capture task feeds it through.
    pub fn channel(capacity: usize) -> (mpsc::Sender<Frame>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl FrameSource for ChannelFrameSource {
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        let Some(mut frame) = self.rx.recv().await else {
            return Ok(None);
        };
        while let Ok(newer) = self.rx.try_recv() {
            frame = newer;
        }
        Ok(Some(frame))
    }

    fn name(&self) -> &str {
        "channel"
    }
}

/// Fixed number of blank frames, for models that ignore pixel data.
#[derive(Debug, Clone)]
pub struct BlankFrameSource {
    remaining: Option<u64>,
    width: u32,
    height: u32,
}

impl BlankFrameSource {
    /// `count` of `None` never ends.
    pub fn new(count: Option<u64>) -> Self {
        Self {
            remaining: count,
            width: 1,
            height: 1,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

#[async_trait]
impl FrameSource for BlankFrameSource {
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        match self.remaining.as_mut() {
            Some(0) => return Ok(None),
            Some(n) => *n -= 1,
            None => {}
        }
        Ok(Some(Frame::new(self.width, self.height)))
    }

    fn name(&self) -> &str {
        "blank"
    }
}
