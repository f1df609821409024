//! Frame model: one decoded video frame in either supported pixel format.

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

/// Pixel format of a frame sequence, declared up front by the source and
/// constant across the whole sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Single-channel 8-bit intensity.
    EightBit,
    /// Three-channel 8-bit color.
    Rgb,
}

/// Color channel nominated for RGB thresholding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    R,
    G,
    B,
}

/// One immutable decoded frame.
#[derive(Debug, Clone)]
pub enum Frame {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl Frame {
    /// Frame dimensions as (width, height) in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Gray(img) => img.dimensions(),
            Self::Rgb(img) => img.dimensions(),
        }
    }

    pub fn pixel_format(&self) -> PixelFormat {
        match self {
            Self::Gray(_) => PixelFormat::EightBit,
            Self::Rgb(_) => PixelFormat::Rgb,
        }
    }
}
