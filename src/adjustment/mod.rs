//! Pose corrections and their durable storage.
//!
//! A [`PoseCorrection`] is a small rigid transform applied on top of a camera's
//! nominal trajectory:
//!
//! ```text
//! center' = t + q · center
//! pose'   = q · pose
//! ```
//!
//! Corrections are persisted per camera through an [`AdjustmentStore`]. The
//! file-backed store in [`file`] writes one translation line and one
//! quaternion line per camera.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

pub mod file;

pub use file::FileAdjustmentStore;

/// Errors raised while reading or writing adjustment resources.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdjustmentError {
    #[error("Adjustment not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("IO error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid number format at line {line}: {value}")]
    InvalidNumber { line: usize, value: String },

    #[error("Missing required fields at line {line}")]
    MissingFields { line: usize },

    #[error("Degenerate rotation quaternion (norm {norm})")]
    DegenerateRotation { norm: f64 },
}

/// Rigid correction applied to a camera's position and attitude history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseCorrection {
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl Default for PoseCorrection {
    fn default() -> Self {
        Self::identity()
    }
}

impl PoseCorrection {
    pub fn new(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Zero translation, identity rotation.
    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), UnitQuaternion::identity())
    }

    /// Build a correction from a raw (possibly unnormalized) quaternion.
    pub fn from_components(
        translation: Vector3<f64>,
        quaternion: Quaternion<f64>,
    ) -> Result<Self, AdjustmentError> {
        let norm = quaternion.norm();
        if !norm.is_finite() || norm < f64::EPSILON {
            return Err(AdjustmentError::DegenerateRotation { norm });
        }
        Ok(Self::new(
            translation,
            UnitQuaternion::from_quaternion(quaternion),
        ))
    }

    /// Map a base-model position to its corrected position.
    pub fn apply_to_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.translation + self.rotation * point
    }

    /// Map a base-model attitude to its corrected attitude.
    pub fn apply_to_rotation(&self, rotation: &UnitQuaternion<f64>) -> UnitQuaternion<f64> {
        self.rotation * rotation
    }

    /// Inverse of [`apply_to_point`](Self::apply_to_point).
    pub fn remove_from_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.inverse_transform_vector(&(point - self.translation))
    }

    pub fn is_identity(&self, tolerance: f64) -> bool {
        self.translation.norm() <= tolerance && self.rotation.angle() <= tolerance
    }

    pub fn is_finite(&self) -> bool {
        self.translation.iter().all(|v| v.is_finite())
            && self.rotation.coords.iter().all(|v| v.is_finite())
    }
}

impl fmt::Display for PoseCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.translation;
        let q = self.rotation.quaternion();
        write!(
            f,
            "PoseCorrection( t=[{:.6}, {:.6}, {:.6}], q=[{:.9}, {:.9}, {:.9}, {:.9}] )",
            t.x, t.y, t.z, q.w, q.i, q.j, q.k
        )
    }
}

/// Durable per-camera storage of pose corrections.
///
/// Writes to one resource are expected to be serialized by the caller.
pub trait AdjustmentStore: Send + Sync {
    /// Read the correction stored under `resource_id`; the rotation is unit-norm.
    fn read(&self, resource_id: &str) -> Result<PoseCorrection, AdjustmentError>;

    /// Create or overwrite the correction stored under `resource_id`.
    fn write(&self, resource_id: &str, correction: &PoseCorrection)
    -> Result<(), AdjustmentError>;
}

/// What to do when a camera has no stored adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingAdjustment {
    /// Start from the identity correction
    #[default]
    UseIdentity,
    /// Propagate [`AdjustmentError::NotFound`]
    Fail,
}

/// Read a correction, resolving a missing resource according to `policy`.
pub fn load_correction(
    store: &dyn AdjustmentStore,
    resource_id: &str,
    policy: MissingAdjustment,
) -> Result<PoseCorrection, AdjustmentError> {
    match store.read(resource_id) {
        Err(AdjustmentError::NotFound { path }) if policy == MissingAdjustment::UseIdentity => {
            warn!(
                "No adjustment for '{}' at {}, using identity",
                resource_id,
                path.display()
            );
            Ok(PoseCorrection::identity())
        }
        other => other,
    }
}
