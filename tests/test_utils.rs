//! Shared fixtures for integration tests
//!
//! All geometry is deterministic and index-based so failures reproduce exactly.

#![allow(dead_code)]

use geoadjust::camera::{AttitudeSample, LineScanOptics, LineScanTrajectory};
use geoadjust::{CameraModel, ControlNetwork, FrameCamera, FrameOptics, PushbroomCamera, TiePoint};
use nalgebra::{UnitQuaternion, Vector2, Vector3};
use std::f64::consts::PI;
use std::sync::Arc;

/// Frame camera with f = 350 mm, 7 µm pixels (50 000 px focal), principal point (512, 384)
pub fn frame_camera(serial: &str, center: Vector3<f64>) -> Arc<dyn CameraModel> {
    frame_camera_with_pose(serial, center, UnitQuaternion::identity())
}

pub fn frame_camera_with_pose(
    serial: &str,
    center: Vector3<f64>,
    pose: UnitQuaternion<f64>,
) -> Arc<dyn CameraModel> {
    let optics = FrameOptics::new(350.0, 0.007, Vector2::new(512.0, 384.0))
        .unwrap_or_else(|e| panic!("fixture optics: {e}"));
    Arc::new(FrameCamera::new(serial, optics, center, pose).with_dimensions(1024, 768))
}

/// Pushbroom camera 400 km above the origin, flying +y at 3 km/s, looking down.
pub fn pushbroom_camera(serial: &str) -> Arc<dyn CameraModel> {
    let nadir = UnitQuaternion::from_euler_angles(PI, 0.0, 0.0);
    let trajectory = LineScanTrajectory::new(
        0.0,
        1e-3,
        vec![
            Vector3::new(0.0, 0.0, 400_000.0),
            Vector3::new(0.0, 3000.0, 0.0),
        ],
        vec![
            AttitudeSample {
                time: -1.0,
                rotation: nadir,
            },
            AttitudeSample {
                time: 2.0,
                rotation: nadir * UnitQuaternion::from_euler_angles(2e-4, -1e-4, 0.0),
            },
        ],
    )
    .unwrap_or_else(|e| panic!("fixture trajectory: {e}"));
    let optics = LineScanOptics::new(350.0, 0.007, 512.0, 1000)
        .unwrap_or_else(|e| panic!("fixture optics: {e}"));
    Arc::new(PushbroomCamera::new(serial, optics, trajectory).with_samples(1024))
}

/// Ground points on a plane in front of a camera at the origin looking +z
pub fn scene_points(n: usize) -> Vec<Vector3<f64>> {
    (0..n)
        .map(|i| {
            let angle = (i as f64 * 2.4) % (2.0 * PI);
            let radius = 2.0 + 3.0 * ((i as f64 * 0.17) % 1.0);
            let depth = 900.0 + 200.0 * ((i as f64 * 0.37) % 1.0);
            Vector3::new(radius * angle.cos(), radius * angle.sin(), depth)
        })
        .collect()
}

/// Deterministic sub-pixel offset for measurement `index`
pub fn pixel_noise(index: usize) -> Vector2<f64> {
    let u = ((index * 12345 + 67890) % 1000) as f64 / 1000.0 - 0.5;
    let v = ((index * 54321 + 98765) % 1000) as f64 / 1000.0 - 0.5;
    Vector2::new(u, v)
}

/// Network observing every point in every camera, with noisy observations.
pub fn observed_network(models: &[Arc<dyn CameraModel>], points: &[Vector3<f64>]) -> ControlNetwork {
    let tie_points = points.iter().enumerate().map(|(id, point)| {
        models
            .iter()
            .enumerate()
            .fold(TiePoint::new(id, *point), |tp, (camera_index, model)| {
                let pixel = model
                    .point_to_pixel(point)
                    .unwrap_or_else(|e| panic!("fixture projection: {e}"));
                let noise = pixel_noise(id * models.len() + camera_index);
                tp.with_measurement(camera_index, pixel + noise)
            })
    });
    ControlNetwork::from_tie_points(tie_points).unwrap_or_else(|e| panic!("fixture network: {e}"))
}
