//! Frame camera model (single exposure, fixed pose).
//!
//! # Projection Model
//!
//! For a ground point `P`, camera center `C` and camera-to-reference rotation `R`:
//!
//! ```text
//! p_cam = Rᵀ (P - C)
//! n     = (x/z, y/z)
//! n_d   = n · (1 + k1·r² + k2·r⁴),   r² = |n|²
//! pixel = (f / pitch) · n_d + pp
//! ```
//!
//! Unprojection inverts the distortion iteratively and returns
//! `R · normalize([n.x, n.y, 1])`.

use super::{CameraError, CameraModel, CameraResult, Extrinsics, Optics, to_camera_frame};
use nalgebra::{UnitQuaternion, Vector2, Vector3};

const UNDISTORT_MAX_ITERATIONS: usize = 50;
const UNDISTORT_TOLERANCE: f64 = 1e-14;

/// Two-term radial lens distortion in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RadialDistortion {
    pub k1: f64,
    pub k2: f64,
}

impl RadialDistortion {
    #[must_use]
    pub const fn new(k1: f64, k2: f64) -> Self {
        Self { k1, k2 }
    }

    pub fn is_none(&self) -> bool {
        self.k1 == 0.0 && self.k2 == 0.0
    }

    fn factor(&self, r2: f64) -> f64 {
        1.0 + self.k1 * r2 + self.k2 * r2 * r2
    }

    /// Apply distortion to undistorted normalized coordinates.
    pub fn distort(&self, n: &Vector2<f64>) -> Vector2<f64> {
        n * self.factor(n.norm_squared())
    }

    /// Remove distortion by fixed-point iteration.
    pub fn undistort(&self, n_d: &Vector2<f64>) -> CameraResult<Vector2<f64>> {
        if self.is_none() {
            return Ok(*n_d);
        }
        let mut n = *n_d;
        for _ in 0..UNDISTORT_MAX_ITERATIONS {
            let factor = self.factor(n.norm_squared());
            if factor.abs() < f64::EPSILON {
                return Err(CameraError::NumericalError(
                    "radial distortion factor vanished".to_string(),
                ));
            }
            let next = n_d / factor;
            if (next - n).amax() < UNDISTORT_TOLERANCE {
                return Ok(next);
            }
            n = next;
        }
        Err(CameraError::NoConvergence {
            iterations: UNDISTORT_MAX_ITERATIONS,
        })
    }
}

/// Optics of a frame sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameOptics {
    /// Focal length (mm)
    pub focal_length: f64,
    /// Pixel pitch (mm/px)
    pub pixel_pitch: f64,
    /// Principal point (pixels)
    pub principal_point: Vector2<f64>,
    pub distortion: RadialDistortion,
}

impl FrameOptics {
    /// Create distortion-free frame optics with validation.
    pub fn new(
        focal_length: f64,
        pixel_pitch: f64,
        principal_point: Vector2<f64>,
    ) -> CameraResult<Self> {
        if !(focal_length > 0.0 && focal_length.is_finite()) {
            return Err(CameraError::Configuration(format!(
                "focal length must be positive, got {focal_length}"
            )));
        }
        if !(pixel_pitch > 0.0 && pixel_pitch.is_finite()) {
            return Err(CameraError::Configuration(format!(
                "pixel pitch must be positive, got {pixel_pitch}"
            )));
        }
        if !principal_point.iter().all(|v| v.is_finite()) {
            return Err(CameraError::Configuration(
                "principal point must be finite".to_string(),
            ));
        }
        Ok(Self {
            focal_length,
            pixel_pitch,
            principal_point,
            distortion: RadialDistortion::default(),
        })
    }

    #[must_use]
    pub fn with_distortion(mut self, distortion: RadialDistortion) -> Self {
        self.distortion = distortion;
        self
    }

    /// Focal length expressed in pixels.
    pub fn focal_pixels(&self) -> f64 {
        self.focal_length / self.pixel_pitch
    }

    fn normalized_to_pixel(&self, n: &Vector2<f64>) -> Vector2<f64> {
        n * self.focal_pixels() + self.principal_point
    }

    fn pixel_to_normalized(&self, pixel: &Vector2<f64>) -> Vector2<f64> {
        (pixel - self.principal_point) / self.focal_pixels()
    }
}

impl Optics for FrameOptics {
    fn project(
        &self,
        point: &Vector3<f64>,
        extrinsics: &dyn Extrinsics,
    ) -> CameraResult<Vector2<f64>> {
        let origin = Vector2::zeros();
        let center = extrinsics.camera_center(&origin)?;
        let pose = extrinsics.camera_pose(&origin)?;
        let p_cam = to_camera_frame(point, &center, &pose)?;

        let inv_z = 1.0 / p_cam.z;
        let n = Vector2::new(p_cam.x * inv_z, p_cam.y * inv_z);
        Ok(self.normalized_to_pixel(&self.distortion.distort(&n)))
    }

    fn back_project(
        &self,
        pixel: &Vector2<f64>,
        extrinsics: &dyn Extrinsics,
    ) -> CameraResult<Vector3<f64>> {
        let pose = extrinsics.camera_pose(pixel)?;
        let n = self
            .distortion
            .undistort(&self.pixel_to_normalized(pixel))?;
        Ok(pose * Vector3::new(n.x, n.y, 1.0).normalize())
    }

    fn focal_length(&self) -> f64 {
        self.focal_length
    }

    fn pixel_pitch(&self) -> f64 {
        self.pixel_pitch
    }
}

/// Frame camera: one exposure, one pose.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameCamera {
    serial_number: String,
    optics: FrameOptics,
    center: Vector3<f64>,
    pose: UnitQuaternion<f64>,
    ephemeris_time: f64,
    sun_position: Vector3<f64>,
    target_radii: Vector3<f64>,
    samples: u32,
    lines: u32,
}

impl FrameCamera {
    /// Create a frame camera at `center` with camera-to-reference rotation `pose`.
    pub fn new(
        serial_number: impl Into<String>,
        optics: FrameOptics,
        center: Vector3<f64>,
        pose: UnitQuaternion<f64>,
    ) -> Self {
        Self {
            serial_number: serial_number.into(),
            optics,
            center,
            pose,
            ephemeris_time: 0.0,
            sun_position: Vector3::zeros(),
            target_radii: Vector3::zeros(),
            samples: 0,
            lines: 0,
        }
    }

    #[must_use]
    pub fn with_dimensions(mut self, samples: u32, lines: u32) -> Self {
        self.samples = samples;
        self.lines = lines;
        self
    }

    #[must_use]
    pub fn with_ephemeris_time(mut self, ephemeris_time: f64) -> Self {
        self.ephemeris_time = ephemeris_time;
        self
    }

    #[must_use]
    pub fn with_sun_position(mut self, sun_position: Vector3<f64>) -> Self {
        self.sun_position = sun_position;
        self
    }

    #[must_use]
    pub fn with_target_radii(mut self, target_radii: Vector3<f64>) -> Self {
        self.target_radii = target_radii;
        self
    }

    pub fn frame_optics(&self) -> &FrameOptics {
        &self.optics
    }
}

impl Extrinsics for FrameCamera {
    fn camera_center(&self, _pixel: &Vector2<f64>) -> CameraResult<Vector3<f64>> {
        Ok(self.center)
    }

    fn camera_pose(&self, _pixel: &Vector2<f64>) -> CameraResult<UnitQuaternion<f64>> {
        Ok(self.pose)
    }
}

impl CameraModel for FrameCamera {
    fn sensor_type(&self) -> &'static str {
        "Frame"
    }

    fn optics(&self) -> &dyn Optics {
        &self.optics
    }

    fn point_to_pixel(&self, point: &Vector3<f64>) -> CameraResult<Vector2<f64>> {
        self.optics.project(point, self)
    }

    fn pixel_to_vector(&self, pixel: &Vector2<f64>) -> CameraResult<Vector3<f64>> {
        self.optics.back_project(pixel, self)
    }

    fn ephemeris_time(&self, _pixel: &Vector2<f64>) -> CameraResult<f64> {
        Ok(self.ephemeris_time)
    }

    fn sun_position(&self, _pixel: &Vector2<f64>) -> CameraResult<Vector3<f64>> {
        Ok(self.sun_position)
    }

    fn target_radii(&self) -> Vector3<f64> {
        self.target_radii
    }

    fn serial_number(&self) -> String {
        self.serial_number.clone()
    }

    fn lines(&self) -> u32 {
        self.lines
    }

    fn samples(&self) -> u32 {
        self.samples
    }
}
