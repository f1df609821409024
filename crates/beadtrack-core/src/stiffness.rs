//! Trap stiffness from a tracked trajectory via the equipartition theorem.
//!
//! The bead's positional spread in a harmonic trap satisfies
//! `½ k <r²> = dof · ½ kB T`, so the stiffness follows from the mean squared
//! radial displacement about the trajectory's own centroid. Centering on the
//! trajectory mean removes any constant offset but not genuine trap drift
//! within the recording.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::tracker::Trajectory;

/// Boltzmann constant [m² kg s⁻² K⁻¹].
pub const BOLTZMANN: f64 = 1.38065e-23;

/// Quadratic degrees of freedom of the radial displacement.
const DEGREES_OF_FREEDOM: f64 = 2.0;

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors that can occur during stiffness estimation.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimateError {
    /// Too few trajectory points for variance-based estimation.
    InsufficientData { needed: usize, got: usize },
    /// A calibration parameter is out of range.
    InvalidParameter(String),
    /// The trajectory has zero positional spread, so the stiffness diverges.
    DegenerateTrajectory,
}

impl std::fmt::Display for EstimateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientData { needed, got } => {
                write!(f, "too few trajectory points: need {}, got {}", needed, got)
            }
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
            Self::DegenerateTrajectory => {
                write!(f, "trajectory has zero positional spread")
            }
        }
    }
}

impl std::error::Error for EstimateError {}

// ── Configuration ──────────────────────────────────────────────────────────

/// Physical calibration for the estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateConfig {
    /// Image scale (micrometres per pixel).
    pub pixel_size_um: f64,
    /// Uncertainty of the image scale (micrometres per pixel).
    pub pixel_size_uncertainty_um: f64,
    /// Bath temperature during the recording (kelvin).
    pub temperature_k: f64,
    /// Uncertainty of the bath temperature (kelvin).
    pub temperature_uncertainty_k: f64,
}

impl Default for EstimateConfig {
    fn default() -> Self {
        // 14.5 ± 0.3 px per micrometre, inverted to micrometres per pixel.
        Self {
            pixel_size_um: 1.0 / 14.5,
            pixel_size_uncertainty_um: 0.3 / (14.5 * 14.5),
            temperature_k: 293.15,
            temperature_uncertainty_k: 5.0,
        }
    }
}

impl EstimateConfig {
    fn validate(&self) -> Result<(), EstimateError> {
        if !(self.pixel_size_um > 0.0) {
            return Err(EstimateError::InvalidParameter(format!(
                "pixel_size_um must be positive, got {}",
                self.pixel_size_um
            )));
        }
        if !(self.temperature_k > 0.0) {
            return Err(EstimateError::InvalidParameter(format!(
                "temperature_k must be positive, got {}",
                self.temperature_k
            )));
        }
        if self.pixel_size_uncertainty_um < 0.0 || self.temperature_uncertainty_k < 0.0 {
            return Err(EstimateError::InvalidParameter(
                "uncertainties must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

// ── Result types ───────────────────────────────────────────────────────────

/// Per-frame displacement series handed back for external plotting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplacementSeries {
    /// Centered x displacement per frame (metres).
    pub x_m: Vec<f64>,
    /// Centered y displacement per frame (metres).
    pub y_m: Vec<f64>,
    /// Squared radial displacement per frame (metres squared).
    pub r2_m2: Vec<f64>,
}

/// Stiffness estimate with propagated uncertainty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StiffnessReport {
    /// Radial trap stiffness (newtons per metre).
    pub stiffness: f64,
    /// Propagated uncertainty of the radial stiffness (newtons per metre).
    pub uncertainty: f64,
    /// Stiffness along x, from the per-axis displacement variance.
    pub stiffness_x: f64,
    /// Stiffness along y, from the per-axis displacement variance.
    pub stiffness_y: f64,
    /// Population variance of the centered x displacement (metres squared).
    pub var_x_m2: f64,
    /// Population variance of the centered y displacement (metres squared).
    pub var_y_m2: f64,
    /// Mean squared radial displacement about the trajectory centroid.
    pub mean_r2_m2: f64,
    /// Per-frame displacement series.
    pub series: DisplacementSeries,
}

// ── Estimation ─────────────────────────────────────────────────────────────

/// Estimate the trap stiffness from a completed trajectory.
///
/// Positions are centered on the trajectory mean and converted to metres.
/// The radial stiffness uses the mean of the squared radial displacement
/// (`k = 2 kB T / <r²>`); the per-axis values use the ordinary per-axis
/// variance (`kB T / var`). The returned uncertainty propagates both the
/// temperature uncertainty and the per-sample position uncertainty, which in
/// turn combines the pixel spread with the calibration uncertainty.
pub fn estimate(
    trajectory: &Trajectory,
    config: &EstimateConfig,
) -> Result<StiffnessReport, EstimateError> {
    config.validate()?;

    let n = trajectory.len();
    if n < 2 {
        return Err(EstimateError::InsufficientData { needed: 2, got: n });
    }

    let scale_m = config.pixel_size_um * 1e-6;
    let scale_uncertainty_m = config.pixel_size_uncertainty_um * 1e-6;

    let x_px = DVector::from_vec(trajectory.xs());
    let y_px = DVector::from_vec(trajectory.ys());

    // Center in pixel space, then convert to metres.
    let x_c = x_px.add_scalar(-x_px.mean());
    let y_c = y_px.add_scalar(-y_px.mean());
    let x_m = &x_c * scale_m;
    let y_m = &y_c * scale_m;

    // Per-sample position uncertainty: the pixel spread through the scale,
    // plus the scale uncertainty acting on the displacement itself.
    let std_x_px = x_px.variance().sqrt();
    let std_y_px = y_px.variance().sqrt();
    let delta_x_m = x_c.map(|c| {
        ((scale_m * std_x_px).powi(2) + (c * scale_uncertainty_m).powi(2)).sqrt()
    });
    let delta_y_m = y_c.map(|c| {
        ((scale_m * std_y_px).powi(2) + (c * scale_uncertainty_m).powi(2)).sqrt()
    });

    let r2 = x_m.component_mul(&x_m) + y_m.component_mul(&y_m);
    let mean_r2 = r2.mean();
    if mean_r2 == 0.0 {
        return Err(EstimateError::DegenerateTrajectory);
    }

    // delta<r²> = (2/N) · sqrt(Σ(δx·x)² + Σ(δy·y)²)
    let sum_sq_x = x_m.component_mul(&delta_x_m).map(|v| v * v).sum();
    let sum_sq_y = y_m.component_mul(&delta_y_m).map(|v| v * v).sum();
    let delta_mean_r2 = 2.0 / (n as f64) * (sum_sq_x + sum_sq_y).sqrt();

    let t = config.temperature_k;
    let delta_t = config.temperature_uncertainty_k;
    let stiffness = DEGREES_OF_FREEDOM * BOLTZMANN * t / mean_r2;
    let uncertainty = DEGREES_OF_FREEDOM
        * BOLTZMANN
        * ((delta_t / mean_r2).powi(2) + (t * delta_mean_r2 / (mean_r2 * mean_r2)).powi(2)).sqrt();

    let var_x = x_m.variance();
    let var_y = y_m.variance();

    Ok(StiffnessReport {
        stiffness,
        uncertainty,
        stiffness_x: BOLTZMANN * t / var_x,
        stiffness_y: BOLTZMANN * t / var_y,
        var_x_m2: var_x,
        var_y_m2: var_y,
        mean_r2_m2: mean_r2,
        series: DisplacementSeries {
            x_m: x_m.iter().copied().collect(),
            y_m: y_m.iter().copied().collect(),
            r2_m2: r2.iter().copied().collect(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn trajectory(points: Vec<[f64; 2]>) -> Trajectory {
        Trajectory {
            start_frame: 0,
            requested_len: points.len(),
            points,
        }
    }

    /// Calibration with exact parameters and no uncertainties.
    fn exact_config(pixel_size_um: f64, temperature_k: f64) -> EstimateConfig {
        EstimateConfig {
            pixel_size_um,
            pixel_size_uncertainty_um: 0.0,
            temperature_k,
            temperature_uncertainty_k: 0.0,
        }
    }

    /// Trajectory jittered around (10, 10) with a fixed seed.
    fn jittered_trajectory(n: usize) -> Trajectory {
        let mut rng = StdRng::seed_from_u64(7);
        let points = (0..n)
            .map(|_| {
                [
                    10.0 + rng.gen_range(-1.5..1.5),
                    10.0 + rng.gen_range(-1.5..1.5),
                ]
            })
            .collect();
        trajectory(points)
    }

    #[test]
    fn stiffness_matches_the_equipartition_formula() {
        // Alternating corners: population variance 1 px² per axis, so the
        // mean squared radial displacement is 2 px².
        let traj = trajectory(vec![[0.0, 0.0], [2.0, 2.0], [0.0, 0.0], [2.0, 2.0]]);
        let config = exact_config(0.5, 293.15);
        let report = estimate(&traj, &config).unwrap();

        let scale_m = 0.5e-6;
        let expected = 2.0 * BOLTZMANN * 293.15 / (2.0 * scale_m * scale_m);
        assert!((report.stiffness - expected).abs() / expected < 1e-10);
    }

    #[test]
    fn per_axis_stiffness_uses_the_per_axis_variance() {
        // Pixel variances: 1 along x, 0.25 along y.
        let traj = trajectory(vec![[0.0, 0.0], [2.0, 1.0], [0.0, 0.0], [2.0, 1.0]]);
        let config = exact_config(0.5, 293.15);
        let report = estimate(&traj, &config).unwrap();

        let scale_m2 = 0.5e-6 * 0.5e-6;
        let kt = BOLTZMANN * 293.15;
        let expected_x = kt / scale_m2;
        let expected_y = kt / (0.25 * scale_m2);
        let expected_radial = 2.0 * kt / (1.25 * scale_m2);
        assert!((report.stiffness_x - expected_x).abs() / expected_x < 1e-10);
        assert!((report.stiffness_y - expected_y).abs() / expected_y < 1e-10);
        assert!((report.stiffness - expected_radial).abs() / expected_radial < 1e-10);
    }

    #[test]
    fn uncertainty_grows_with_temperature_uncertainty() {
        let traj = jittered_trajectory(64);
        let mut previous = -1.0;
        for delta_t in [0.0, 1.0, 5.0, 10.0] {
            let config = EstimateConfig {
                temperature_uncertainty_k: delta_t,
                ..EstimateConfig::default()
            };
            let report = estimate(&traj, &config).unwrap();
            assert!(report.uncertainty >= previous);
            previous = report.uncertainty;
        }
    }

    #[test]
    fn uncertainty_is_positive_with_nonzero_calibration_uncertainty() {
        let traj = jittered_trajectory(64);
        let report = estimate(&traj, &EstimateConfig::default()).unwrap();
        assert!(report.stiffness.is_finite() && report.stiffness > 0.0);
        assert!(report.uncertainty > 0.0);
    }

    #[test]
    fn single_point_trajectory_is_insufficient() {
        let traj = trajectory(vec![[1.0, 1.0]]);
        let err = estimate(&traj, &EstimateConfig::default()).unwrap_err();
        assert_eq!(err, EstimateError::InsufficientData { needed: 2, got: 1 });
    }

    #[test]
    fn non_positive_calibration_is_rejected() {
        let traj = trajectory(vec![[0.0, 0.0], [1.0, 1.0]]);
        for config in [
            exact_config(0.0, 293.15),
            exact_config(-1.0, 293.15),
            exact_config(0.5, 0.0),
            exact_config(0.5, -10.0),
        ] {
            let err = estimate(&traj, &config).unwrap_err();
            assert!(matches!(err, EstimateError::InvalidParameter(_)));
        }
    }

    #[test]
    fn motionless_trajectory_is_degenerate() {
        let traj = trajectory(vec![[3.0, 4.0]; 8]);
        let err = estimate(&traj, &EstimateConfig::default()).unwrap_err();
        assert_eq!(err, EstimateError::DegenerateTrajectory);
    }

    #[test]
    fn report_series_are_centered_and_consistent() {
        let traj = jittered_trajectory(32);
        let report = estimate(&traj, &EstimateConfig::default()).unwrap();

        let mean_x: f64 = report.series.x_m.iter().sum::<f64>() / 32.0;
        assert!(mean_x.abs() < 1e-18);
        for i in 0..32 {
            let r2 = report.series.x_m[i].powi(2) + report.series.y_m[i].powi(2);
            assert!((r2 - report.series.r2_m2[i]).abs() < 1e-24);
        }
    }

    #[test]
    fn tracked_drift_scenario_yields_finite_positive_stiffness() {
        // The end-to-end scenario: a marker drifting +1 px per frame over
        // ten frames, tracked and then analyzed.
        use crate::frame::{Frame, PixelFormat};
        use crate::source::MemorySource;
        use crate::tracker::{track, TrackConfig};
        use image::{GrayImage, Luma};

        let frames = (0..10u32)
            .map(|i| {
                let mut img = GrayImage::from_pixel(16, 8, Luma([0]));
                img.put_pixel(i, 0, Luma([255]));
                Frame::Gray(img)
            })
            .collect();
        let mut source = MemorySource::new(PixelFormat::EightBit, frames);
        let cfg = TrackConfig {
            max_displacement: 2,
            spot_radius: 0,
            threshold: 150.0,
            start_frame: 0,
            stop_frame: 10,
            channel: None,
        };
        let traj = track(&mut source, [0.0, 0.0], &cfg).unwrap();
        let expected: Vec<[f64; 2]> = (0..10).map(|i| [f64::from(i), 0.0]).collect();
        assert_eq!(traj.points, expected);

        let report = estimate(&traj, &EstimateConfig::default()).unwrap();
        assert!(report.stiffness.is_finite() && report.stiffness > 0.0);
        assert!(report.uncertainty > 0.0);
    }
}
