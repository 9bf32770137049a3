//! JSON sensor labels.
//!
//! A label carries the metadata a camera model is built from. Common fields sit
//! at the top level; the `sensor` tag selects the family-specific geometry:
//!
//! ```json
//! {
//!   "sensor": "frame",
//!   "spacecraft": "MRO", "instrument": "CTX", "start_clock": "0001:000",
//!   "samples": 1024, "lines": 768,
//!   "focal_length": 350.0, "pixel_pitch": 0.007,
//!   "center": [0.0, 0.0, 400000.0],
//!   "rotation": [0.0, 1.0, 0.0, 0.0],
//!   "principal_point": [512.0, 384.0]
//! }
//! ```
//!
//! Quaternions are written `[w, x, y, z]` and rotate camera-frame vectors into
//! the reference frame.

use super::SessionError;
use crate::camera::{
    AttitudeSample, CameraError, FrameCamera, FrameOptics, LineScanOptics, LineScanTrajectory,
    LineSearchConfig, PushbroomCamera, RadialDistortion,
};
use nalgebra::{Quaternion, UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Sensor metadata shared by all families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorLabel {
    pub spacecraft: String,
    pub instrument: String,
    pub start_clock: String,
    /// Overrides the `spacecraft/instrument/start_clock` serial number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    pub samples: u32,
    pub lines: u32,
    /// Focal length (mm)
    pub focal_length: f64,
    /// Pixel pitch (mm/px)
    pub pixel_pitch: f64,
    #[serde(default)]
    pub sun_position: [f64; 3],
    #[serde(default)]
    pub target_radii: [f64; 3],
    #[serde(flatten)]
    pub geometry: SensorGeometry,
}

/// Family-specific geometry, selected by the `sensor` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sensor", rename_all = "snake_case")]
pub enum SensorGeometry {
    Frame(FrameGeometry),
    LineScan(LineScanGeometry),
    Rpc(RpcGeometry),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub center: [f64; 3],
    /// `[w, x, y, z]`
    pub rotation: [f64; 4],
    pub principal_point: [f64; 2],
    #[serde(default)]
    pub k1: f64,
    #[serde(default)]
    pub k2: f64,
    #[serde(default)]
    pub ephemeris_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttitudeRecord {
    pub time: f64,
    /// `[w, x, y, z]`
    pub rotation: [f64; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineScanGeometry {
    /// Ephemeris time of line 0
    pub start_time: f64,
    /// Seconds per line
    pub line_period: f64,
    pub sample_center: f64,
    #[serde(default)]
    pub along_track_offset: f64,
    /// Position polynomial coefficients in `t - start_time`, constant term first
    pub position_coefficients: Vec<[f64; 3]>,
    pub attitude: Vec<AttitudeRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
}

/// Rational polynomial coefficients are accepted but not interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcGeometry {}

impl SensorGeometry {
    pub fn family_name(&self) -> &'static str {
        match self {
            SensorGeometry::Frame(_) => "frame",
            SensorGeometry::LineScan(_) => "line_scan",
            SensorGeometry::Rpc(_) => "rpc",
        }
    }
}

impl SensorLabel {
    /// Deterministic identity of the acquisition.
    pub fn serial_number(&self) -> String {
        match &self.serial_number {
            Some(serial) => serial.clone(),
            None => format!(
                "{}/{}/{}",
                self.spacecraft, self.instrument, self.start_clock
            ),
        }
    }

    /// Build a frame camera; fails if the label describes another family.
    pub fn to_frame_camera(&self) -> Result<FrameCamera, SessionError> {
        let SensorGeometry::Frame(geometry) = &self.geometry else {
            return Err(self.family_mismatch("frame"));
        };

        let optics = FrameOptics::new(
            self.focal_length,
            self.pixel_pitch,
            Vector2::from(geometry.principal_point),
        )?
        .with_distortion(RadialDistortion::new(geometry.k1, geometry.k2));

        Ok(FrameCamera::new(
            self.serial_number(),
            optics,
            Vector3::from(geometry.center),
            unit_rotation(geometry.rotation)?,
        )
        .with_dimensions(self.samples, self.lines)
        .with_ephemeris_time(geometry.ephemeris_time)
        .with_sun_position(Vector3::from(self.sun_position))
        .with_target_radii(Vector3::from(self.target_radii)))
    }

    /// Build a pushbroom camera; fails if the label describes another family.
    pub fn to_pushbroom_camera(&self) -> Result<PushbroomCamera, SessionError> {
        let SensorGeometry::LineScan(geometry) = &self.geometry else {
            return Err(self.family_mismatch("line_scan"));
        };

        let mut search = LineSearchConfig::default();
        if let Some(max_iterations) = geometry.max_iterations {
            search = search.with_max_iterations(max_iterations);
        }
        if let Some(tolerance) = geometry.tolerance {
            search = search.with_tolerance(tolerance);
        }
        let optics = LineScanOptics::new(
            self.focal_length,
            self.pixel_pitch,
            geometry.sample_center,
            self.lines,
        )?
        .with_along_track_offset(geometry.along_track_offset)
        .with_search(search);

        let attitude = geometry
            .attitude
            .iter()
            .map(|record| {
                Ok(AttitudeSample {
                    time: record.time,
                    rotation: unit_rotation(record.rotation)?,
                })
            })
            .collect::<Result<Vec<_>, CameraError>>()?;
        let trajectory = LineScanTrajectory::new(
            geometry.start_time,
            geometry.line_period,
            geometry
                .position_coefficients
                .iter()
                .map(|c| Vector3::from(*c))
                .collect(),
            attitude,
        )?;

        Ok(PushbroomCamera::new(self.serial_number(), optics, trajectory)
            .with_samples(self.samples)
            .with_sun_position(Vector3::from(self.sun_position))
            .with_target_radii(Vector3::from(self.target_radii)))
    }

    fn family_mismatch(&self, expected: &str) -> SessionError {
        SessionError::Configuration(format!(
            "label for {} describes a {} sensor, expected {}",
            self.serial_number(),
            self.geometry.family_name(),
            expected
        ))
    }
}

fn unit_rotation([w, x, y, z]: [f64; 4]) -> Result<UnitQuaternion<f64>, CameraError> {
    let q = Quaternion::new(w, x, y, z);
    let norm = q.norm();
    if !norm.is_finite() || norm < f64::EPSILON {
        return Err(CameraError::Configuration(format!(
            "degenerate rotation quaternion [{w}, {x}, {y}, {z}]"
        )));
    }
    Ok(UnitQuaternion::from_quaternion(q))
}
