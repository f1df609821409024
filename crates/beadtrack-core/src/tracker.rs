//! Search-window tracking: one marker centroid per analyzed frame.

use serde::{Deserialize, Serialize};

use crate::frame::{Channel, PixelFormat};
use crate::source::{FrameSource, FrameSourceError};
use crate::threshold::classify;
use crate::window::SearchWindow;

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors that can occur while tracking.
#[derive(Debug)]
pub enum TrackError {
    /// RGB thresholding was requested without a nominated channel.
    MissingChannel,
    /// The tracking configuration is inconsistent.
    InvalidConfig(String),
    /// The frame source failed.
    Source(FrameSourceError),
}

impl std::fmt::Display for TrackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingChannel => {
                write!(f, "RGB input requires a nominated color channel")
            }
            Self::InvalidConfig(msg) => write!(f, "invalid tracking configuration: {}", msg),
            Self::Source(e) => write!(f, "frame source error: {}", e),
        }
    }
}

impl std::error::Error for TrackError {}

impl From<FrameSourceError> for TrackError {
    fn from(e: FrameSourceError) -> Self {
        Self::Source(e)
    }
}

// ── Configuration ──────────────────────────────────────────────────────────

/// Tracking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackConfig {
    /// Maximum inter-frame travel of the marker (pixels).
    pub max_displacement: u32,
    /// Marker radius (pixels).
    pub spot_radius: u32,
    /// Qualification threshold: minimum intensity for gray input, minimum
    /// channel excess for RGB input.
    pub threshold: f64,
    /// First analyzed frame index.
    pub start_frame: usize,
    /// One past the last analyzed frame index.
    pub stop_frame: usize,
    /// Channel nominated for RGB thresholding; ignored for gray input.
    pub channel: Option<Channel>,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            max_displacement: 5,
            spot_radius: 7,
            threshold: 150.0,
            start_frame: 0,
            stop_frame: 100,
            channel: None,
        }
    }
}

impl TrackConfig {
    /// Fail-fast validation against the declared source format.
    pub fn validate(&self, format: PixelFormat) -> Result<(), TrackError> {
        if self.stop_frame < self.start_frame {
            return Err(TrackError::InvalidConfig(format!(
                "stop_frame {} precedes start_frame {}",
                self.stop_frame, self.start_frame
            )));
        }
        if format == PixelFormat::Rgb && self.channel.is_none() {
            return Err(TrackError::MissingChannel);
        }
        Ok(())
    }

    fn base_half_width(&self) -> u32 {
        self.max_displacement + self.spot_radius
    }
}

// ── Trajectory ─────────────────────────────────────────────────────────────

/// Centroid trajectory over the analyzed frame range.
///
/// Index `i` corresponds to frame `start_frame + i`. A frame where the marker
/// was lost still contributes a (stale) centroid, so the only way the length
/// can fall short of the requested range is the source running out early.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    /// Index of the first analyzed frame.
    pub start_frame: usize,
    /// Number of frames requested for analysis (`stop_frame - start_frame`).
    pub requested_len: usize,
    /// One centroid per analyzed frame, in frame order.
    pub points: Vec<[f64; 2]>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The source ran out before `stop_frame`.
    pub fn is_truncated(&self) -> bool {
        self.points.len() < self.requested_len
    }

    pub fn xs(&self) -> Vec<f64> {
        self.points.iter().map(|p| p[0]).collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.points.iter().map(|p| p[1]).collect()
    }
}

// ── Tracking pass ──────────────────────────────────────────────────────────

/// Track the marker across the analyzed frame range `[start_frame, stop_frame)`.
///
/// `seed` is the marker position in the first analyzed frame and is assumed
/// to lie within frame bounds. Frames before `start_frame` are decoded and
/// skipped so frame indices stay aligned with the source. A frame with no
/// qualifying pixels keeps the previous centroid and widens the next search
/// window by the loss counter; any hit resets both. The pass ends at
/// `stop_frame` or at end-of-stream, whichever comes first; an early end
/// yields a truncated trajectory and a logged notice.
pub fn track(
    source: &mut dyn FrameSource,
    seed: [f64; 2],
    config: &TrackConfig,
) -> Result<Trajectory, TrackError> {
    config.validate(source.pixel_format())?;

    let requested_len = config.stop_frame - config.start_frame;
    let base_half = config.base_half_width();

    let mut centroid = seed;
    let mut loss_counter: u64 = 2;
    let mut growth: u64 = 1;
    let mut points = Vec::with_capacity(requested_len);

    let mut index = 0usize;
    while index < config.stop_frame {
        let frame = match source.next_frame()? {
            Some(frame) => frame,
            None => break,
        };
        if index >= config.start_frame {
            let half = u64::from(base_half)
                .saturating_mul(growth)
                .min(u64::from(u32::MAX)) as u32;
            let window = SearchWindow::centered(centroid, half);
            let found = classify(&frame, &window, config.channel, config.threshold)?;
            if found.is_empty() {
                tracing::warn!("no marker found in frame {}", index);
                growth = loss_counter;
                loss_counter = loss_counter.saturating_mul(loss_counter);
            } else {
                centroid = centroid_of(&found);
                growth = 1;
                loss_counter = 2;
            }
            points.push(centroid);
        }
        index += 1;
    }

    if points.len() < requested_len {
        tracing::warn!(
            "frame source ended after {} of {} requested frames",
            points.len(),
            requested_len
        );
    }
    tracing::info!("tracked {} frames", points.len());

    Ok(Trajectory {
        start_frame: config.start_frame,
        requested_len,
        points,
    })
}

/// Unweighted arithmetic mean of the qualifying pixel coordinates.
fn centroid_of(points: &[[f64; 2]]) -> [f64; 2] {
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
    [sx / n, sy / n]
}
