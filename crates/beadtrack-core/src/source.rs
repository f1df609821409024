//! Frame sources: finite, ordered sequences of decoded frames.

use crate::frame::{Frame, PixelFormat};

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors produced while pulling frames from a source.
#[derive(Debug)]
pub enum FrameSourceError {
    /// Underlying file or stream I/O failed.
    Io(std::io::Error),
    /// Frame decoding failed.
    Decode(image::ImageError),
}

impl std::fmt::Display for FrameSourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "frame i/o failed: {}", e),
            Self::Decode(e) => write!(f, "frame decode failed: {}", e),
        }
    }
}

impl std::error::Error for FrameSourceError {}

impl From<std::io::Error> for FrameSourceError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ── Trait ──────────────────────────────────────────────────────────────────

/// A finite, ordered sequence of frames, indexed from 0.
///
/// Sources are strictly sequential: the tracker pulls one frame at a time and
/// never reads ahead. Every frame must match [`FrameSource::pixel_format`].
pub trait FrameSource {
    /// Pixel format shared by every frame in the sequence.
    fn pixel_format(&self) -> PixelFormat;

    /// Next frame in sequence order, or `None` once the sequence is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError>;
}

/// In-memory frame source backed by a `Vec<Frame>`.
pub struct MemorySource {
    format: PixelFormat,
    frames: std::vec::IntoIter<Frame>,
}

impl MemorySource {
    pub fn new(format: PixelFormat, frames: Vec<Frame>) -> Self {
        Self {
            format,
            frames: frames.into_iter(),
        }
    }
}

impl FrameSource for MemorySource {
    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        Ok(self.frames.next())
    }
}
