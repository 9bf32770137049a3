//! Pose-corrected camera model.
//!
//! [`AdjustedCameraModel`] shares a base model and owns a [`PoseCorrection`].
//! Its extrinsics are the base extrinsics with the correction applied; every
//! projection is re-derived by running the base model's optics through those
//! corrected extrinsics, so focal length, distortion and line timing stay those
//! of the base sensor.

use super::{CameraError, CameraModel, CameraResult, Extrinsics, Optics};
use crate::adjustment::{AdjustmentStore, MissingAdjustment, PoseCorrection, load_correction};
use crate::error::GeoAdjustResult;
use nalgebra::{UnitQuaternion, Vector2, Vector3};
use std::sync::Arc;

/// A base camera model with a rigid pose correction applied.
#[derive(Debug, Clone)]
pub struct AdjustedCameraModel {
    base: Arc<dyn CameraModel>,
    correction: PoseCorrection,
}

impl AdjustedCameraModel {
    /// Wrap `base` with `correction`.
    ///
    /// # Errors
    /// [`CameraError::Configuration`] if the correction has non-finite components.
    pub fn new(base: Arc<dyn CameraModel>, correction: PoseCorrection) -> CameraResult<Self> {
        if !correction.is_finite() {
            return Err(CameraError::Configuration(format!(
                "non-finite pose correction for {}",
                base.serial_number()
            )));
        }
        Ok(Self { base, correction })
    }

    /// Wrap `base` with the correction stored under `resource_id`.
    ///
    /// A missing resource is an error here; use
    /// [`from_store_with_policy`](Self::from_store_with_policy) to fall back to identity.
    pub fn from_store(
        base: Arc<dyn CameraModel>,
        store: &dyn AdjustmentStore,
        resource_id: &str,
    ) -> GeoAdjustResult<Self> {
        Self::from_store_with_policy(base, store, resource_id, MissingAdjustment::Fail)
    }

    pub fn from_store_with_policy(
        base: Arc<dyn CameraModel>,
        store: &dyn AdjustmentStore,
        resource_id: &str,
        policy: MissingAdjustment,
    ) -> GeoAdjustResult<Self> {
        let correction = load_correction(store, resource_id, policy)?;
        Ok(Self::new(base, correction)?)
    }

    /// A fresh model sharing the same base with a different correction.
    pub fn with_correction(&self, correction: PoseCorrection) -> CameraResult<Self> {
        Self::new(Arc::clone(&self.base), correction)
    }

    pub fn base(&self) -> &Arc<dyn CameraModel> {
        &self.base
    }

    pub fn correction(&self) -> &PoseCorrection {
        &self.correction
    }
}

impl Extrinsics for AdjustedCameraModel {
    fn camera_center(&self, pixel: &Vector2<f64>) -> CameraResult<Vector3<f64>> {
        Ok(self
            .correction
            .apply_to_point(&self.base.camera_center(pixel)?))
    }

    fn camera_pose(&self, pixel: &Vector2<f64>) -> CameraResult<UnitQuaternion<f64>> {
        Ok(self
            .correction
            .apply_to_rotation(&self.base.camera_pose(pixel)?))
    }
}

impl CameraModel for AdjustedCameraModel {
    fn sensor_type(&self) -> &'static str {
        self.base.sensor_type()
    }

    fn optics(&self) -> &dyn Optics {
        self.base.optics()
    }

    fn point_to_pixel(&self, point: &Vector3<f64>) -> CameraResult<Vector2<f64>> {
        self.base.optics().project(point, self)
    }

    fn pixel_to_vector(&self, pixel: &Vector2<f64>) -> CameraResult<Vector3<f64>> {
        self.base.optics().back_project(pixel, self)
    }

    fn ephemeris_time(&self, pixel: &Vector2<f64>) -> CameraResult<f64> {
        self.base.ephemeris_time(pixel)
    }

    fn sun_position(&self, pixel: &Vector2<f64>) -> CameraResult<Vector3<f64>> {
        self.base.sun_position(pixel)
    }

    fn target_radii(&self) -> Vector3<f64> {
        self.base.target_radii()
    }

    fn serial_number(&self) -> String {
        self.base.serial_number()
    }

    fn lines(&self) -> u32 {
        self.base.lines()
    }

    fn samples(&self) -> u32 {
        self.base.samples()
    }
}
