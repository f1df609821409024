//! beadtrack CLI — track a trapped bead in video frames and estimate trap
//! stiffness.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use beadtrack_core::annotate::annotate;
use beadtrack_core::{
    estimate, track, AnalysisResult, Channel, EstimateConfig, Frame, FrameSource,
    FrameSourceError, PixelFormat, TrackConfig, Trajectory,
};
use image::AnimationDecoder;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "beadtrack")]
#[command(about = "Track a trapped bead in video frames and estimate trap stiffness")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track the bead and write the centroid trajectory (JSON).
    Track(CliTrackArgs),

    /// Estimate trap stiffness from a saved trajectory (JSON).
    Estimate(CliEstimateArgs),

    /// Track and estimate in one pass.
    Analyze(CliAnalyzeArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliPixelFormat {
    /// Single-channel 8-bit intensity frames.
    #[value(name = "8-bit")]
    EightBit,
    /// Three-channel color frames.
    Rgb,
}

impl CliPixelFormat {
    fn to_core(self) -> PixelFormat {
        match self {
            Self::EightBit => PixelFormat::EightBit,
            Self::Rgb => PixelFormat::Rgb,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliChannel {
    R,
    G,
    B,
}

impl CliChannel {
    fn to_core(self) -> Channel {
        match self {
            Self::R => Channel::R,
            Self::G => Channel::G,
            Self::B => Channel::B,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct CliTrackArgs {
    /// Frame sequence: a directory of image files (sorted by name) or an
    /// animated GIF.
    #[arg(long)]
    frames: PathBuf,

    /// Pixel format of the sequence.
    #[arg(long, value_enum, default_value_t = CliPixelFormat::EightBit)]
    format: CliPixelFormat,

    /// Channel nominated for RGB thresholding (required for RGB input).
    #[arg(long, value_enum)]
    channel: Option<CliChannel>,

    /// Bead x position in the first analyzed frame (pixels).
    #[arg(long)]
    seed_x: f64,

    /// Bead y position in the first analyzed frame (pixels).
    #[arg(long)]
    seed_y: f64,

    /// Maximum inter-frame travel of the bead (pixels).
    #[arg(long, default_value = "5")]
    max_displacement: u32,

    /// Bead radius (pixels).
    #[arg(long, default_value = "7")]
    spot_radius: u32,

    /// Minimum net brightness: intensity for 8-bit input, channel excess for
    /// RGB input (0-255).
    #[arg(long, default_value = "150")]
    threshold: f64,

    /// First analyzed frame index.
    #[arg(long, default_value = "0")]
    start_frame: usize,

    /// One past the last analyzed frame index.
    #[arg(long, default_value = "100")]
    stop_frame: usize,

    /// Path to write the trajectory (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Directory to save annotated frame copies to.
    #[arg(long)]
    annotate_dir: Option<PathBuf>,

    /// Dot half-size for annotated frames (pixels).
    #[arg(long, default_value = "2")]
    dot_radius: u32,
}

impl CliTrackArgs {
    fn to_config(&self) -> TrackConfig {
        TrackConfig {
            max_displacement: self.max_displacement,
            spot_radius: self.spot_radius,
            threshold: self.threshold,
            start_frame: self.start_frame,
            stop_frame: self.stop_frame,
            channel: self.channel.map(CliChannel::to_core),
        }
    }
}

#[derive(Debug, Clone, Args)]
struct CliCalibrationArgs {
    /// Image scale (micrometres per pixel).
    #[arg(long)]
    pixel_size_um: f64,

    /// Uncertainty of the image scale (micrometres per pixel).
    #[arg(long, default_value = "0.0")]
    pixel_size_uncertainty_um: f64,

    /// Bath temperature during the recording (kelvin).
    #[arg(long, default_value = "293.15")]
    temperature_k: f64,

    /// Uncertainty of the bath temperature (kelvin).
    #[arg(long, default_value = "5.0")]
    temperature_uncertainty_k: f64,
}

impl CliCalibrationArgs {
    fn to_config(&self) -> EstimateConfig {
        EstimateConfig {
            pixel_size_um: self.pixel_size_um,
            pixel_size_uncertainty_um: self.pixel_size_uncertainty_um,
            temperature_k: self.temperature_k,
            temperature_uncertainty_k: self.temperature_uncertainty_k,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct CliEstimateArgs {
    /// Path to a trajectory JSON written by the track subcommand.
    #[arg(long)]
    trajectory: PathBuf,

    #[command(flatten)]
    calibration: CliCalibrationArgs,

    /// Path to write the stiffness report (JSON).
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct CliAnalyzeArgs {
    #[command(flatten)]
    track: CliTrackArgs,

    #[command(flatten)]
    calibration: CliCalibrationArgs,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Track(args) => run_track(&args),
        Commands::Estimate(args) => run_estimate(&args),
        Commands::Analyze(args) => run_analyze(&args),
    }
}

// ── Frame sources ──────────────────────────────────────────────────────────

/// Lexicographically sorted image files in a directory, decoded one at a time.
struct DirSource {
    format: PixelFormat,
    paths: std::vec::IntoIter<PathBuf>,
}

impl DirSource {
    fn open(dir: &Path, format: PixelFormat) -> CliResult<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| is_frame_file(path))
            .collect();
        paths.sort();
        if paths.is_empty() {
            return Err(format!("no frame images found in {}", dir.display()).into());
        }
        Ok(Self {
            format,
            paths: paths.into_iter(),
        })
    }
}

fn is_frame_file(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    matches!(
        ext.as_deref(),
        Some("png" | "jpg" | "jpeg" | "bmp" | "tif" | "tiff")
    )
}

impl FrameSource for DirSource {
    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        let path = match self.paths.next() {
            Some(path) => path,
            None => return Ok(None),
        };
        let img = image::open(&path).map_err(FrameSourceError::Decode)?;
        Ok(Some(to_frame(img, self.format)))
    }
}

/// Frames of an animated GIF, decoded lazily in sequence order.
struct GifSource {
    format: PixelFormat,
    frames: image::Frames<'static>,
}

impl GifSource {
    fn open(path: &Path, format: PixelFormat) -> CliResult<Self> {
        let reader = std::io::BufReader::new(std::fs::File::open(path)?);
        let decoder = image::codecs::gif::GifDecoder::new(reader)?;
        Ok(Self {
            format,
            frames: decoder.into_frames(),
        })
    }
}

impl FrameSource for GifSource {
    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        let frame = match self.frames.next() {
            Some(frame) => frame.map_err(FrameSourceError::Decode)?,
            None => return Ok(None),
        };
        let img = image::DynamicImage::ImageRgba8(frame.into_buffer());
        Ok(Some(to_frame(img, self.format)))
    }
}

fn to_frame(img: image::DynamicImage, format: PixelFormat) -> Frame {
    match format {
        PixelFormat::EightBit => Frame::Gray(img.to_luma8()),
        PixelFormat::Rgb => Frame::Rgb(img.to_rgb8()),
    }
}

fn open_source(path: &Path, format: PixelFormat) -> CliResult<Box<dyn FrameSource>> {
    if path.is_dir() {
        return Ok(Box::new(DirSource::open(path, format)?));
    }
    let is_gif = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gif"));
    if is_gif {
        return Ok(Box::new(GifSource::open(path, format)?));
    }
    Err(format!(
        "unsupported frame source {}: expected a directory of images or a .gif",
        path.display()
    )
    .into())
}

// ── track ──────────────────────────────────────────────────────────────────

fn run_track(args: &CliTrackArgs) -> CliResult<()> {
    let trajectory = track_frames(args)?;

    let json = serde_json::to_string_pretty(&trajectory)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!("Trajectory written to {}", args.out.display());

    if let Some(ref dir) = args.annotate_dir {
        save_annotated_frames(args, &trajectory, dir)?;
    }

    Ok(())
}

fn track_frames(args: &CliTrackArgs) -> CliResult<Trajectory> {
    tracing::info!("Loading frames: {}", args.frames.display());
    let mut source = open_source(&args.frames, args.format.to_core())?;

    let config = args.to_config();
    let trajectory = track(source.as_mut(), [args.seed_x, args.seed_y], &config)?;

    if trajectory.is_truncated() {
        tracing::warn!(
            "requested frames {}..{} but the source ended after {} analyzed frames",
            config.start_frame,
            config.stop_frame,
            trajectory.len()
        );
    }
    Ok(trajectory)
}

fn save_annotated_frames(
    args: &CliTrackArgs,
    trajectory: &Trajectory,
    dir: &Path,
) -> CliResult<()> {
    std::fs::create_dir_all(dir)?;
    let mut source = open_source(&args.frames, args.format.to_core())?;

    // Second pass over the sequence, pairing analyzed frames with centroids.
    for _ in 0..trajectory.start_frame {
        if source.next_frame()?.is_none() {
            break;
        }
    }
    for (i, centroid) in trajectory.points.iter().enumerate() {
        let frame = match source.next_frame()? {
            Some(frame) => frame,
            None => break,
        };
        let overlaid = annotate(&frame, *centroid, args.dot_radius);
        let path = dir.join(format!("frame_{:04}.png", trajectory.start_frame + i));
        overlaid.save(&path)?;
    }
    tracing::info!(
        "{} annotated frames written to {}",
        trajectory.len(),
        dir.display()
    );
    Ok(())
}

// ── estimate ───────────────────────────────────────────────────────────────

fn run_estimate(args: &CliEstimateArgs) -> CliResult<()> {
    let json = std::fs::read_to_string(&args.trajectory)?;
    let trajectory: Trajectory = serde_json::from_str(&json)?;
    tracing::info!(
        "Loaded trajectory: {} frames starting at {}",
        trajectory.len(),
        trajectory.start_frame
    );

    let report = estimate(&trajectory, &args.calibration.to_config())?;
    print_headline(report.stiffness, report.uncertainty);

    let out = serde_json::to_string_pretty(&report)?;
    std::fs::write(&args.out, &out)?;
    tracing::info!("Stiffness report written to {}", args.out.display());
    Ok(())
}

// ── analyze ────────────────────────────────────────────────────────────────

fn run_analyze(args: &CliAnalyzeArgs) -> CliResult<()> {
    let trajectory = track_frames(&args.track)?;
    let report = estimate(&trajectory, &args.calibration.to_config())?;
    print_headline(report.stiffness, report.uncertainty);

    let result = AnalysisResult { trajectory, report };
    let json = serde_json::to_string_pretty(&result)?;
    std::fs::write(&args.track.out, &json)?;
    tracing::info!("Analysis written to {}", args.track.out.display());

    if let Some(ref dir) = args.track.annotate_dir {
        save_annotated_frames(&args.track, &result.trajectory, dir)?;
    }

    Ok(())
}

fn print_headline(stiffness: f64, uncertainty: f64) {
    println!("trap stiffness: {:.4e} +/- {:.4e} N/m", stiffness, uncertainty);
}
