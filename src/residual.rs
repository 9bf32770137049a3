//! Reprojection residuals over a control network.
//!
//! For every measurement `(camera_index, observed)` of every tie point `P`:
//!
//! ```text
//! residual = models[camera_index].point_to_pixel(P) - observed
//! ```
//!
//! Entries are ordered by tie point, then by measurement in stored order. A
//! projection failure is kept local to its measurement: the entry carries a
//! zero error and an [`ResidualStatus::Invalid`] flag with the reason, and the
//! rest of the vector is computed normally.

use crate::camera::{CameraError, CameraModel};
use crate::control::{ControlNetwork, ControlNetworkError, Measurement};
use nalgebra::{DVector, Vector2, Vector3};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that prevent residual evaluation as a whole.
#[derive(Error, Debug)]
pub enum ResidualError {
    #[error(transparent)]
    Network(#[from] ControlNetworkError),

    #[error("Expected {expected} ground points (one per tie point), got {actual}")]
    PointCountMismatch { expected: usize, actual: usize },
}

/// Residual evaluation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResidualConfig {
    /// Evaluate measurements on the rayon thread pool
    pub parallel: bool,
    /// Minimum number of measurements before going parallel
    pub parallel_threshold: usize,
}

impl Default for ResidualConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            parallel_threshold: 256,
        }
    }
}

impl ResidualConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_parallel_threshold(mut self, parallel_threshold: usize) -> Self {
        self.parallel_threshold = parallel_threshold;
        self
    }
}

/// Outcome of projecting one measurement.
#[derive(Debug, Clone, PartialEq)]
pub enum ResidualStatus {
    Valid,
    /// Projection failed; the error is zero and should be ignored by the solver
    Invalid(CameraError),
}

/// Residual of one measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Residual {
    pub tie_point_id: usize,
    pub camera_index: usize,
    pub observed: Vector2<f64>,
    /// Predicted minus observed pixel, zero when invalid
    pub error: Vector2<f64>,
    pub status: ResidualStatus,
}

impl Residual {
    pub fn is_valid(&self) -> bool {
        matches!(self.status, ResidualStatus::Valid)
    }
}

/// Summary statistics over residual norms (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResidualStats {
    pub mean: f64,
    pub rms: f64,
    pub max: f64,
    /// Number of valid residuals included
    pub count: usize,
}

impl ResidualStats {
    fn from_norms(norms: impl IntoIterator<Item = f64>) -> Self {
        let (mut sum, mut sum_sq, mut max, mut count) = (0.0, 0.0, 0.0_f64, 0usize);
        for n in norms {
            sum += n;
            sum_sq += n * n;
            max = max.max(n);
            count += 1;
        }
        if count == 0 {
            return Self::default();
        }
        Self {
            mean: sum / count as f64,
            rms: (sum_sq / count as f64).sqrt(),
            max,
            count,
        }
    }
}

/// Ordered residuals for a whole control network.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResidualVector {
    entries: Vec<Residual>,
}

impl ResidualVector {
    pub fn entries(&self) -> &[Residual] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Residual> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn valid_count(&self) -> usize {
        self.entries.iter().filter(|r| r.is_valid()).count()
    }

    pub fn invalid_count(&self) -> usize {
        self.len() - self.valid_count()
    }

    /// One flag per entry, `true` for valid projections.
    pub fn validity_mask(&self) -> Vec<bool> {
        self.entries.iter().map(Residual::is_valid).collect()
    }

    /// Flattened `[du0, dv0, du1, dv1, …]`, zeros for invalid entries.
    pub fn to_dvector(&self) -> DVector<f64> {
        DVector::from_iterator(
            2 * self.entries.len(),
            self.entries.iter().flat_map(|r| [r.error.x, r.error.y]),
        )
    }

    /// Statistics over all valid entries.
    pub fn stats(&self) -> ResidualStats {
        ResidualStats::from_norms(
            self.entries
                .iter()
                .filter(|r| r.is_valid())
                .map(|r| r.error.norm()),
        )
    }

    /// Statistics over valid entries, grouped by camera index.
    pub fn per_camera_stats(&self) -> BTreeMap<usize, ResidualStats> {
        let mut norms: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
        for r in self.entries.iter().filter(|r| r.is_valid()) {
            norms.entry(r.camera_index).or_default().push(r.error.norm());
        }
        norms
            .into_iter()
            .map(|(camera, n)| (camera, ResidualStats::from_norms(n)))
            .collect()
    }
}

impl<'a> IntoIterator for &'a ResidualVector {
    type Item = &'a Residual;
    type IntoIter = std::slice::Iter<'a, Residual>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Evaluates reprojection residuals. Stateless apart from its configuration.
#[derive(Debug, Clone, Default)]
pub struct ResidualComputer {
    config: ResidualConfig,
}

impl ResidualComputer {
    pub fn new(config: ResidualConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResidualConfig {
        &self.config
    }

    /// Residuals at the ground positions stored in the network.
    pub fn compute(
        &self,
        models: &[Arc<dyn CameraModel>],
        network: &ControlNetwork,
    ) -> Result<ResidualVector, ResidualError> {
        self.compute_with_points(models, network, &network.positions())
    }

    /// Residuals at caller-supplied ground positions, one per tie point.
    pub fn compute_with_points(
        &self,
        models: &[Arc<dyn CameraModel>],
        network: &ControlNetwork,
        points: &[Vector3<f64>],
    ) -> Result<ResidualVector, ResidualError> {
        if points.len() != network.len() {
            return Err(ResidualError::PointCountMismatch {
                expected: network.len(),
                actual: points.len(),
            });
        }
        network.validate_camera_indices(models.len())?;

        let jobs: Vec<(usize, &Vector3<f64>, &Measurement)> = network
            .tie_points()
            .iter()
            .zip(points)
            .flat_map(|(tp, point)| tp.measurements.iter().map(move |m| (tp.id, point, m)))
            .collect();

        let evaluate = |&(id, point, m): &(usize, &Vector3<f64>, &Measurement)| {
            Self::evaluate(models, id, point, m)
        };

        let entries: Vec<Residual> =
            if self.config.parallel && jobs.len() >= self.config.parallel_threshold {
                jobs.par_iter().map(evaluate).collect()
            } else {
                jobs.iter().map(evaluate).collect()
            };

        let residuals = ResidualVector { entries };
        let stats = residuals.stats();
        info!(
            "Computed {} residuals over {} tie points ({} invalid), rms {:.4} px, max {:.4} px",
            residuals.len(),
            network.len(),
            residuals.invalid_count(),
            stats.rms,
            stats.max
        );
        Ok(residuals)
    }

    fn evaluate(
        models: &[Arc<dyn CameraModel>],
        tie_point_id: usize,
        point: &Vector3<f64>,
        measurement: &Measurement,
    ) -> Residual {
        let (error, status) = match models[measurement.camera_index].point_to_pixel(point) {
            Ok(predicted) if predicted.iter().all(|v| v.is_finite()) => {
                (predicted - measurement.pixel, ResidualStatus::Valid)
            }
            Ok(predicted) => {
                let e = CameraError::NumericalError(format!(
                    "non-finite predicted pixel [{}, {}]",
                    predicted.x, predicted.y
                ));
                debug!(
                    "Tie point {} in camera {}: {}",
                    tie_point_id, measurement.camera_index, e
                );
                (Vector2::zeros(), ResidualStatus::Invalid(e))
            }
            Err(e) => {
                debug!(
                    "Tie point {} in camera {}: projection failed: {}",
                    tie_point_id, measurement.camera_index, e
                );
                (Vector2::zeros(), ResidualStatus::Invalid(e))
            }
        };
        Residual {
            tie_point_id,
            camera_index: measurement.camera_index,
            observed: measurement.pixel,
            error,
            status,
        }
    }
}
