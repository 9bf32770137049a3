//! Pushbroom (line scan) camera model.
//!
//! Each image line is exposed at its own instant:
//!
//! ```text
//! t(line) = start_time + line · line_period
//! ```
//!
//! The sensor position is a polynomial in `t - start_time` and the attitude is
//! spherically interpolated between timed quaternion samples. The attitude
//! samples bound the valid time window; queries outside it fail with
//! [`CameraError::OutsideTrajectory`].
//!
//! Ground-to-image projection has no closed form: the line is found with a
//! secant search on the along-track angle of the point in the camera frame,
//! after which the sample follows from the cross-track angle.

use super::{CameraError, CameraModel, CameraResult, Extrinsics, Optics, to_camera_frame};
use nalgebra::{UnitQuaternion, Vector2, Vector3};

/// Stopping rules for the ground-to-image line search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearchConfig {
    /// Maximum number of secant iterations
    pub max_iterations: usize,
    /// Convergence tolerance on the line update (lines)
    pub tolerance: f64,
}

impl Default for LineSearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-8,
        }
    }
}

impl LineSearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Attitude of the sensor at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttitudeSample {
    pub time: f64,
    /// Camera-to-reference rotation
    pub rotation: UnitQuaternion<f64>,
}

/// Position and attitude history of a pushbroom sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct LineScanTrajectory {
    start_time: f64,
    line_period: f64,
    position_coefficients: Vec<Vector3<f64>>,
    attitude: Vec<AttitudeSample>,
}

impl LineScanTrajectory {
    /// Create a trajectory.
    ///
    /// * `start_time` - ephemeris time of line 0
    /// * `line_period` - seconds per line
    /// * `position_coefficients` - `c0 + c1·dt + c2·dt² + …` with `dt = t - start_time`
    /// * `attitude` - at least two samples with strictly increasing times
    pub fn new(
        start_time: f64,
        line_period: f64,
        position_coefficients: Vec<Vector3<f64>>,
        attitude: Vec<AttitudeSample>,
    ) -> CameraResult<Self> {
        if !(line_period > 0.0 && line_period.is_finite()) {
            return Err(CameraError::Configuration(format!(
                "line period must be positive, got {line_period}"
            )));
        }
        if position_coefficients.is_empty() {
            return Err(CameraError::Configuration(
                "position polynomial needs at least one coefficient".to_string(),
            ));
        }
        if attitude.len() < 2 {
            return Err(CameraError::Configuration(format!(
                "attitude history needs at least 2 samples, got {}",
                attitude.len()
            )));
        }
        if attitude.windows(2).any(|w| w[1].time <= w[0].time) {
            return Err(CameraError::Configuration(
                "attitude sample times must be strictly increasing".to_string(),
            ));
        }
        Ok(Self {
            start_time,
            line_period,
            position_coefficients,
            attitude,
        })
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn line_period(&self) -> f64 {
        self.line_period
    }

    /// Valid time window `(start, end)` covered by the attitude samples.
    pub fn window(&self) -> (f64, f64) {
        // new() guarantees at least two samples
        (
            self.attitude[0].time,
            self.attitude[self.attitude.len() - 1].time,
        )
    }

    /// Ephemeris time at which `line` was exposed.
    pub fn time_at_line(&self, line: f64) -> f64 {
        self.start_time + line * self.line_period
    }

    fn check_time(&self, time: f64) -> CameraResult<()> {
        let (start, end) = self.window();
        if !(time >= start && time <= end) {
            return Err(CameraError::OutsideTrajectory { time, start, end });
        }
        Ok(())
    }

    /// Sensor position at `time`.
    pub fn position_at(&self, time: f64) -> CameraResult<Vector3<f64>> {
        self.check_time(time)?;
        let dt = time - self.start_time;
        Ok(self
            .position_coefficients
            .iter()
            .rev()
            .fold(Vector3::zeros(), |acc, c| acc * dt + c))
    }

    /// Camera-to-reference rotation at `time`.
    pub fn attitude_at(&self, time: f64) -> CameraResult<UnitQuaternion<f64>> {
        self.check_time(time)?;
        let upper = self.attitude.partition_point(|s| s.time <= time);
        let i = upper.saturating_sub(1).min(self.attitude.len() - 2);
        let (a, b) = (&self.attitude[i], &self.attitude[i + 1]);
        let alpha = (time - a.time) / (b.time - a.time);

        // q and -q are the same rotation; interpolate along the short arc
        let end = if a.rotation.coords.dot(&b.rotation.coords) < 0.0 {
            UnitQuaternion::new_unchecked(-b.rotation.into_inner())
        } else {
            b.rotation
        };
        Ok(a.rotation
            .try_slerp(&end, alpha, 1e-12)
            .unwrap_or_else(|| a.rotation.nlerp(&end, alpha)))
    }
}

/// Optics of a pushbroom sensor: a single detector row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineScanOptics {
    /// Focal length (mm)
    pub focal_length: f64,
    /// Pixel pitch (mm/px)
    pub pixel_pitch: f64,
    /// Sample coordinate of the boresight
    pub sample_center: f64,
    /// Normalized along-track position of the detector row (0 = boresight)
    pub along_track_offset: f64,
    /// Number of lines; the line search starts mid-image
    pub lines: u32,
    pub search: LineSearchConfig,
}

impl LineScanOptics {
    pub fn new(
        focal_length: f64,
        pixel_pitch: f64,
        sample_center: f64,
        lines: u32,
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
        if !sample_center.is_finite() {
            return Err(CameraError::Configuration(
                "sample center must be finite".to_string(),
            ));
        }
        Ok(Self {
            focal_length,
            pixel_pitch,
            sample_center,
            along_track_offset: 0.0,
            lines,
            search: LineSearchConfig::default(),
        })
    }

    #[must_use]
    pub fn with_along_track_offset(mut self, along_track_offset: f64) -> Self {
        self.along_track_offset = along_track_offset;
        self
    }

    #[must_use]
    pub fn with_search(mut self, search: LineSearchConfig) -> Self {
        self.search = search;
        self
    }

    pub fn focal_pixels(&self) -> f64 {
        self.focal_length / self.pixel_pitch
    }

    /// Camera-frame point and along-track residual at `line`.
    fn along_track(
        &self,
        point: &Vector3<f64>,
        line: f64,
        extrinsics: &dyn Extrinsics,
    ) -> CameraResult<(f64, Vector3<f64>)> {
        let pixel = Vector2::new(self.sample_center, line);
        let center = extrinsics.camera_center(&pixel)?;
        let pose = extrinsics.camera_pose(&pixel)?;
        let p_cam = to_camera_frame(point, &center, &pose)?;
        Ok((p_cam.y / p_cam.z - self.along_track_offset, p_cam))
    }

    fn sample_from_camera(&self, p_cam: &Vector3<f64>) -> f64 {
        self.focal_pixels() * p_cam.x / p_cam.z + self.sample_center
    }
}

impl Optics for LineScanOptics {
    fn project(
        &self,
        point: &Vector3<f64>,
        extrinsics: &dyn Extrinsics,
    ) -> CameraResult<Vector2<f64>> {
        let mut prev_line = f64::from(self.lines) * 0.5;
        let (mut prev_residual, _) = self.along_track(point, prev_line, extrinsics)?;
        let mut line = prev_line + 1.0;

        for _ in 0..self.search.max_iterations {
            let (residual, p_cam) = self.along_track(point, line, extrinsics)?;
            if residual == 0.0 {
                return Ok(Vector2::new(self.sample_from_camera(&p_cam), line));
            }

            let slope = (residual - prev_residual) / (line - prev_line);
            if !slope.is_finite() || slope.abs() < f64::EPSILON {
                return Err(CameraError::NumericalError(format!(
                    "flat along-track residual near line {line}"
                )));
            }

            let next = line - residual / slope;
            if (next - line).abs() < self.search.tolerance {
                let (_, p_cam) = self.along_track(point, next, extrinsics)?;
                return Ok(Vector2::new(self.sample_from_camera(&p_cam), next));
            }

            prev_line = line;
            prev_residual = residual;
            line = next;
        }

        Err(CameraError::NoConvergence {
            iterations: self.search.max_iterations,
        })
    }

    fn back_project(
        &self,
        pixel: &Vector2<f64>,
        extrinsics: &dyn Extrinsics,
    ) -> CameraResult<Vector3<f64>> {
        let pose = extrinsics.camera_pose(pixel)?;
        let cross_track = (pixel.x - self.sample_center) / self.focal_pixels();
        Ok(pose * Vector3::new(cross_track, self.along_track_offset, 1.0).normalize())
    }

    fn focal_length(&self) -> f64 {
        self.focal_length
    }

    fn pixel_pitch(&self) -> f64 {
        self.pixel_pitch
    }
}

/// Pushbroom camera: one detector row swept along a trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct PushbroomCamera {
    serial_number: String,
    optics: LineScanOptics,
    trajectory: LineScanTrajectory,
    sun_position: Vector3<f64>,
    target_radii: Vector3<f64>,
    samples: u32,
}

impl PushbroomCamera {
    pub fn new(
        serial_number: impl Into<String>,
        optics: LineScanOptics,
        trajectory: LineScanTrajectory,
    ) -> Self {
        Self {
            serial_number: serial_number.into(),
            optics,
            trajectory,
            sun_position: Vector3::zeros(),
            target_radii: Vector3::zeros(),
            samples: 0,
        }
    }

    #[must_use]
    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples;
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

    pub fn trajectory(&self) -> &LineScanTrajectory {
        &self.trajectory
    }

    pub fn line_scan_optics(&self) -> &LineScanOptics {
        &self.optics
    }
}

impl Extrinsics for PushbroomCamera {
    fn camera_center(&self, pixel: &Vector2<f64>) -> CameraResult<Vector3<f64>> {
        self.trajectory
            .position_at(self.trajectory.time_at_line(pixel.y))
    }

    fn camera_pose(&self, pixel: &Vector2<f64>) -> CameraResult<UnitQuaternion<f64>> {
        self.trajectory
            .attitude_at(self.trajectory.time_at_line(pixel.y))
    }
}

impl CameraModel for PushbroomCamera {
    fn sensor_type(&self) -> &'static str {
        "LineScan"
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

    fn ephemeris_time(&self, pixel: &Vector2<f64>) -> CameraResult<f64> {
        Ok(self.trajectory.time_at_line(pixel.y))
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
        self.optics.lines
    }

    fn samples(&self) -> u32 {
        self.samples
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn nadir() -> UnitQuaternion<f64> {
        UnitQuaternion::from_euler_angles(PI, 0.0, 0.0)
    }

    /// 400 km altitude, 3 km/s along +y, 1 ms lines, 1000 lines.
    fn orbiter(attitude_drift: f64) -> PushbroomCamera {
        let attitude = vec![
            AttitudeSample {
                time: -1.0,
                rotation: nadir(),
            },
            AttitudeSample {
                time: 0.5,
                rotation: nadir() * UnitQuaternion::from_euler_angles(attitude_drift, 0.0, 0.0),
            },
            AttitudeSample {
                time: 2.0,
                rotation: nadir()
                    * UnitQuaternion::from_euler_angles(2.0 * attitude_drift, attitude_drift, 0.0),
            },
        ];
        let trajectory = LineScanTrajectory::new(
            0.0,
            1e-3,
            vec![Vector3::new(0.0, 0.0, 400_000.0), Vector3::new(0.0, 3000.0, 0.0)],
            attitude,
        )
        .unwrap();
        let optics = LineScanOptics::new(350.0, 0.007, 512.0, 1000).unwrap();
        PushbroomCamera::new("TEST/PUSHBROOM/1", optics, trajectory).with_samples(1024)
    }

    #[test]
    fn test_time_and_position_follow_line() -> TestResult {
        let camera = orbiter(0.0);
        assert!((camera.ephemeris_time(&Vector2::new(0.0, 250.0))? - 0.25).abs() < 1e-12);
        let c = camera.camera_center(&Vector2::new(0.0, 250.0))?;
        assert!((c - Vector3::new(0.0, 750.0, 400_000.0)).norm() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_nadir_point_projects_to_its_line() -> TestResult {
        let camera = orbiter(0.0);
        // Directly below the sensor at line 400 (t = 0.4 s, y = 1200 m)
        let pixel = camera.point_to_pixel(&Vector3::new(0.0, 1200.0, 0.0))?;
        assert!((pixel.x - 512.0).abs() < 1e-6, "sample {}", pixel.x);
        assert!((pixel.y - 400.0).abs() < 1e-6, "line {}", pixel.y);
        Ok(())
    }

    #[test]
    fn test_ray_projection_consistency() -> TestResult {
        let camera = orbiter(1e-4);
        for &(u, v) in &[(0.0, 0.0), (512.0, 500.0), (1023.0, 999.0), (17.3, 250.8)] {
            let pixel = Vector2::new(u, v);
            let center = camera.camera_center(&pixel)?;
            let ray = camera.pixel_to_vector(&pixel)?;
            assert!((ray.norm() - 1.0).abs() < 1e-12);
            for t in [1_000.0, 200_000.0, 400_000.0, 1_000_000.0] {
                let reprojected = camera.point_to_pixel(&(center + ray * t))?;
                let err = (reprojected - pixel).norm();
                assert!(err < 1e-6, "pixel ({u}, {v}) t={t}: err={err}");
            }
        }
        Ok(())
    }

    #[test]
    fn test_pose_varies_per_line() -> TestResult {
        let camera = orbiter(1e-3);
        let early = camera.camera_pose(&Vector2::new(0.0, 0.0))?;
        let late = camera.camera_pose(&Vector2::new(0.0, 999.0))?;
        assert!(early.angle_to(&late) > 1e-5);
        Ok(())
    }

    #[test]
    fn test_point_outside_trajectory_window_fails() {
        let camera = orbiter(0.0);
        // 10 000 km along track: the search lands far beyond the last attitude sample
        let result = camera.point_to_pixel(&Vector3::new(0.0, 1.0e7, 0.0));
        assert!(matches!(
            result,
            Err(CameraError::OutsideTrajectory { .. })
        ));
    }

    #[test]
    fn test_center_outside_window_fails() {
        let camera = orbiter(0.0);
        let result = camera.camera_center(&Vector2::new(0.0, 5000.0));
        assert!(matches!(
            result,
            Err(CameraError::OutsideTrajectory { time, .. }) if (time - 5.0).abs() < 1e-12
        ));
    }

    #[test]
    fn test_attitude_interpolation_midpoint() -> TestResult {
        let a = UnitQuaternion::identity();
        let b = UnitQuaternion::from_euler_angles(0.0, 0.0, 0.2);
        let trajectory = LineScanTrajectory::new(
            0.0,
            1.0,
            vec![Vector3::zeros()],
            vec![
                AttitudeSample {
                    time: 0.0,
                    rotation: a,
                },
                AttitudeSample {
                    time: 1.0,
                    rotation: UnitQuaternion::new_unchecked(-b.into_inner()),
                },
            ],
        )?;
        let mid = trajectory.attitude_at(0.5)?;
        let expected = UnitQuaternion::from_euler_angles(0.0, 0.0, 0.1);
        assert!((mid.coords - expected.coords).amax() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_invalid_trajectory_rejected() {
        let sample = AttitudeSample {
            time: 0.0,
            rotation: UnitQuaternion::identity(),
        };
        assert!(matches!(
            LineScanTrajectory::new(0.0, 1e-3, vec![Vector3::zeros()], vec![sample]),
            Err(CameraError::Configuration(_))
        ));
        assert!(matches!(
            LineScanTrajectory::new(0.0, 0.0, vec![Vector3::zeros()], vec![sample, sample]),
            Err(CameraError::Configuration(_))
        ));
        assert!(matches!(
            LineScanTrajectory::new(0.0, 1e-3, vec![Vector3::zeros()], vec![sample, sample]),
            Err(CameraError::Configuration(_))
        ));
        assert!(matches!(
            LineScanTrajectory::new(0.0, 1e-3, Vec::new(), vec![sample]),
            Err(CameraError::Configuration(_))
        ));
    }
}
