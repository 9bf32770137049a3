//! Residual evaluation benchmark
//!
//! Compares sequential and parallel residual evaluation on a synthetic network
//! of frame and pushbroom cameras, and measures pushbroom ground-to-image
//! projection on its own since its line search dominates the cost.
//!
//! ```bash
//! cargo bench --bench residual_benchmark
//! ```

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use geoadjust::camera::{AttitudeSample, LineScanOptics, LineScanTrajectory};
use geoadjust::{
    AdjustedCameraModel, CameraModel, ControlNetwork, FrameCamera, FrameOptics, PoseCorrection,
    PushbroomCamera, ResidualComputer, ResidualConfig, TiePoint, init_logger_with_level,
};
use nalgebra::{UnitQuaternion, Vector2, Vector3};
use std::f64::consts::PI;
use std::hint::black_box;
use std::sync::Arc;
use tracing::Level;

fn nadir() -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(PI, 0.0, 0.0)
}

fn pushbroom(offset_x: f64) -> Arc<dyn CameraModel> {
    let trajectory = LineScanTrajectory::new(
        0.0,
        1e-3,
        vec![
            Vector3::new(offset_x, 0.0, 400_000.0),
            Vector3::new(0.0, 3000.0, 0.0),
        ],
        vec![
            AttitudeSample {
                time: -1.0,
                rotation: nadir(),
            },
            AttitudeSample {
                time: 0.5,
                rotation: nadir() * UnitQuaternion::from_euler_angles(1e-4, 0.0, 0.0),
            },
            AttitudeSample {
                time: 2.0,
                rotation: nadir() * UnitQuaternion::from_euler_angles(2e-4, 5e-5, 0.0),
            },
        ],
    )
    .unwrap_or_else(|e| panic!("trajectory: {e}"));
    let optics =
        LineScanOptics::new(350.0, 0.007, 512.0, 1000).unwrap_or_else(|e| panic!("optics: {e}"));
    Arc::new(PushbroomCamera::new("BENCH/PB", optics, trajectory).with_samples(1024))
}

fn frame(offset_x: f64) -> Arc<dyn CameraModel> {
    let optics = FrameOptics::new(350.0, 0.007, Vector2::new(512.0, 384.0))
        .unwrap_or_else(|e| panic!("optics: {e}"));
    Arc::new(
        FrameCamera::new(
            "BENCH/FR",
            optics,
            Vector3::new(offset_x, 1500.0, 400_000.0),
            nadir(),
        )
        .with_dimensions(1024, 768),
    )
}

fn models() -> Vec<Arc<dyn CameraModel>> {
    let correction = PoseCorrection::new(
        Vector3::new(0.5, -0.25, 1.0),
        UnitQuaternion::from_euler_angles(1e-5, -1e-5, 2e-5),
    );
    vec![
        frame(0.0),
        frame(200.0),
        pushbroom(0.0),
        Arc::new(
            AdjustedCameraModel::new(pushbroom(150.0), correction)
                .unwrap_or_else(|e| panic!("adjusted: {e}")),
        ),
    ]
}

/// Ground grid under the overlap of all cameras, observed by each of them.
fn network(models: &[Arc<dyn CameraModel>], n: usize) -> ControlNetwork {
    let side = (n as f64).sqrt().ceil() as usize;
    let tie_points = (0..n).map(|id| {
        let ground = Vector3::new(
            (id % side) as f64 / side as f64 * 400.0 - 150.0,
            1400.0 + (id / side) as f64 / side as f64 * 250.0,
            0.0,
        );
        models
            .iter()
            .enumerate()
            .fold(TiePoint::new(id, ground), |tp, (camera_index, model)| {
                let pixel = model
                    .point_to_pixel(&ground)
                    .unwrap_or_else(|_| Vector2::new(512.0, 384.0));
                tp.with_measurement(camera_index, pixel + Vector2::new(0.3, -0.2))
            })
    });
    ControlNetwork::from_tie_points(tie_points).unwrap_or_else(|e| panic!("network: {e}"))
}

fn residual_benchmarks(c: &mut Criterion) {
    init_logger_with_level(Level::WARN);

    let models = models();
    let mut group = c.benchmark_group("residuals");
    for &n in &[100usize, 1_000, 10_000] {
        let network = network(&models, n);
        for (label, config) in [
            ("sequential", ResidualConfig::default().with_parallel(false)),
            ("parallel", ResidualConfig::default().with_parallel_threshold(0)),
        ] {
            let computer = ResidualComputer::new(config);
            group.bench_with_input(BenchmarkId::new(label, n), &network, |b, network| {
                b.iter(|| black_box(computer.compute(&models, network)))
            });
        }
    }
    group.finish();

    let camera = pushbroom(0.0);
    let ground = Vector3::new(25.0, 1500.0, 0.0);
    c.bench_function("pushbroom_point_to_pixel", |b| {
        b.iter(|| black_box(camera.point_to_pixel(black_box(&ground))))
    });
}

criterion_group!(benches, residual_benchmarks);
criterion_main!(benches);
