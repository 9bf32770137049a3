//! Camera models for remote-sensing imagery.
//!
//! A camera model converts between ground points, per-pixel viewing rays and
//! image-plane pixels for one acquisition. All vectors are expressed in a single
//! body-fixed reference frame.
//!
//! # Architecture
//!
//! Every model is split into two halves:
//!
//! 1. **[`Extrinsics`]**: where the sensor was and how it was oriented at the
//!    imaging instant of a given pixel (trajectory and attitude history).
//! 2. **[`Optics`]**: the fixed, sensor-specific mapping between camera-frame
//!    directions and pixels (focal length, pixel pitch, distortion, line timing).
//!
//! [`CameraModel`] ties both halves together. Projection is always computed by
//! handing an `Extrinsics` implementation to the model's `Optics`, which is what
//! lets [`AdjustedCameraModel`] swap in corrected extrinsics while reusing the
//! base optics untouched.
//!
//! # Available Camera Models
//!
//! - **Frame**: single exposure, fixed pose ([`FrameCamera`])
//! - **Pushbroom**: one imaging instant per line ([`PushbroomCamera`])
//! - **Adjusted**: pose-corrected wrapper around any other model ([`AdjustedCameraModel`])
//!
//! Pose convention: `camera_pose` rotates camera-frame vectors into the
//! reference frame; camera-frame `+z` is the boresight.

use nalgebra::{UnitQuaternion, Vector2, Vector3};
use std::fmt::Debug;

pub mod adjusted;
pub mod frame;
pub mod linescan;

pub use adjusted::AdjustedCameraModel;
pub use frame::{FrameCamera, FrameOptics, RadialDistortion};
pub use linescan::{
    AttitudeSample, LineScanOptics, LineScanTrajectory, LineSearchConfig, PushbroomCamera,
};

/// Minimum camera-frame depth for a point to be considered in front of the sensor.
pub const MIN_DEPTH: f64 = 1e-6;

/// Result type for camera queries.
pub type CameraResult<T> = Result<T, CameraError>;

/// Camera model errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("Point is behind the sensor (camera-frame depth {depth})")]
    PointBehindSensor { depth: f64 },
    #[error("Time {time} is outside the trajectory window [{start}, {end}]")]
    OutsideTrajectory { time: f64, start: f64, end: f64 },
    #[error("Ground-to-image search did not converge after {iterations} iterations")]
    NoConvergence { iterations: usize },
    #[error("NumericalError: {0}")]
    NumericalError(String),
    #[error("Invalid camera configuration: {0}")]
    Configuration(String),
    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

/// Position and orientation history of a sensor.
///
/// Both queries take the pixel whose imaging instant is requested. Sensors
/// with a single exposure ignore it.
pub trait Extrinsics {
    /// Sensor position at the imaging instant of `pixel`.
    fn camera_center(&self, pixel: &Vector2<f64>) -> CameraResult<Vector3<f64>>;

    /// Camera-to-reference rotation at the imaging instant of `pixel`.
    fn camera_pose(&self, pixel: &Vector2<f64>) -> CameraResult<UnitQuaternion<f64>>;
}

/// Sensor-fixed optics.
///
/// Implementations never store a pose: every call receives the extrinsics to
/// project through.
pub trait Optics: Send + Sync + Debug {
    /// Project a ground point to a pixel through the given extrinsics.
    fn project(
        &self,
        point: &Vector3<f64>,
        extrinsics: &dyn Extrinsics,
    ) -> CameraResult<Vector2<f64>>;

    /// Unit viewing ray in the reference frame for a pixel, through the given extrinsics.
    fn back_project(
        &self,
        pixel: &Vector2<f64>,
        extrinsics: &dyn Extrinsics,
    ) -> CameraResult<Vector3<f64>>;

    /// Focal length in millimetres.
    fn focal_length(&self) -> f64;

    /// Detector pixel pitch in millimetres per pixel.
    fn pixel_pitch(&self) -> f64;
}

/// Trait for camera models.
///
/// Implementations must be immutable after construction and `Send + Sync`
/// so a single instance can be queried concurrently.
pub trait CameraModel: Extrinsics + Send + Sync + Debug {
    /// Short sensor type name (e.g. `"Frame"`, `"LineScan"`).
    fn sensor_type(&self) -> &'static str;

    /// Intrinsic optics of this sensor.
    fn optics(&self) -> &dyn Optics;

    /// Project a ground point to image coordinates `(sample, line)`.
    fn point_to_pixel(&self, point: &Vector3<f64>) -> CameraResult<Vector2<f64>>;

    /// Unit viewing ray through `pixel`, originating at `camera_center(pixel)`.
    fn pixel_to_vector(&self, pixel: &Vector2<f64>) -> CameraResult<Vector3<f64>>;

    /// Ephemeris time of the imaging instant of `pixel`.
    fn ephemeris_time(&self, pixel: &Vector2<f64>) -> CameraResult<f64>;

    /// Sun position in the reference frame at the imaging instant of `pixel`.
    fn sun_position(&self, pixel: &Vector2<f64>) -> CameraResult<Vector3<f64>>;

    /// Radii `(a, b, c)` of the target body reference ellipsoid.
    fn target_radii(&self) -> Vector3<f64>;

    /// Stable identity of the acquisition.
    fn serial_number(&self) -> String;

    /// Number of image lines.
    fn lines(&self) -> u32;

    /// Number of image samples per line.
    fn samples(&self) -> u32;
}

/// Human-readable one-line summary of a camera model.
///
/// The center is evaluated at the image origin and reported as unavailable
/// when that pixel falls outside the sensor's trajectory window.
pub fn describe(camera: &dyn CameraModel) -> String {
    let center = match camera.camera_center(&Vector2::zeros()) {
        Ok(c) => format!("[{:.6}, {:.6}, {:.6}]", c.x, c.y, c.z),
        Err(_) => "unavailable".to_string(),
    };
    format!(
        "{}( Serial={}, f={:.9} mm, pitch={:.9} mm/px, Center={} )",
        camera.sensor_type(),
        camera.serial_number(),
        camera.optics().focal_length(),
        camera.optics().pixel_pitch(),
        center
    )
}

/// Rotate a reference-frame offset into the camera frame and reject points behind the sensor.
pub(crate) fn to_camera_frame(
    point: &Vector3<f64>,
    center: &Vector3<f64>,
    pose: &UnitQuaternion<f64>,
) -> CameraResult<Vector3<f64>> {
    let p_cam = pose.inverse_transform_vector(&(point - center));
    if !p_cam.iter().all(|v| v.is_finite()) {
        return Err(CameraError::NumericalError(format!(
            "non-finite camera-frame point [{}, {}, {}]",
            p_cam.x, p_cam.y, p_cam.z
        )));
    }
    if p_cam.z < MIN_DEPTH {
        return Err(CameraError::PointBehindSensor { depth: p_cam.z });
    }
    Ok(p_cam)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn frame_camera() -> FrameCamera {
        FrameCamera::new(
            "MRO/CTX/0001:000",
            FrameOptics::new(350.0, 0.007, Vector2::new(512.0, 384.0)).unwrap(),
            Vector3::new(0.0, 0.0, 0.0),
            UnitQuaternion::identity(),
        )
        .with_dimensions(1024, 768)
    }

    #[test]
    fn test_describe_contains_identity_and_optics() {
        let camera = frame_camera();
        let text = describe(&camera);
        assert!(text.starts_with("Frame("));
        assert!(text.contains("Serial=MRO/CTX/0001:000"));
        assert!(text.contains("f=350.000000000 mm"));
        assert!(text.contains("pitch=0.007000000 mm/px"));
        assert!(text.contains("Center=[0.000000, 0.000000, 0.000000]"));
    }

    #[test]
    fn test_to_camera_frame_rejects_points_behind() {
        let result = to_camera_frame(
            &Vector3::new(0.0, 0.0, -5.0),
            &Vector3::zeros(),
            &UnitQuaternion::identity(),
        );
        assert!(matches!(
            result,
            Err(CameraError::PointBehindSensor { depth }) if depth < 0.0
        ));
    }

    #[test]
    fn test_to_camera_frame_rejects_non_finite_points() {
        for point in [
            Vector3::new(0.0, 0.0, f64::NAN),
            Vector3::new(f64::INFINITY, 0.0, 10.0),
        ] {
            let result = to_camera_frame(&point, &Vector3::zeros(), &UnitQuaternion::identity());
            assert!(matches!(result, Err(CameraError::NumericalError(_))));
        }

        let camera = frame_camera();
        assert!(matches!(
            camera.point_to_pixel(&Vector3::new(0.0, 0.0, f64::NAN)),
            Err(CameraError::NumericalError(_))
        ));
    }

    #[test]
    fn test_camera_models_are_object_safe_and_shareable() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn CameraModel>();

        let camera: std::sync::Arc<dyn CameraModel> = std::sync::Arc::new(frame_camera());
        assert_eq!(camera.samples(), 1024);
        assert_eq!(camera.lines(), 768);
    }
}
