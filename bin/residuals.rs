use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use geoadjust::init_logger;
use geoadjust::{
    CameraModel, ControlNetworkLoader, FileAdjustmentStore, MissingAdjustment, ResidualComputer,
    ResidualConfig, SessionInputs, SessionRegistry, describe,
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "residuals")]
#[command(about = "Compute reprojection residuals of a control network against adjusted cameras")]
struct Args {
    /// Control network file (.cnet)
    #[arg(short, long)]
    network: PathBuf,

    /// Images, in camera-index order. Labels are read from `<image stem>.json`
    #[arg(short, long, num_args = 1.., required = true)]
    images: Vec<PathBuf>,

    /// Camera files matching --images one to one (overrides sidecar labels)
    #[arg(short, long, num_args = 1..)]
    cameras: Vec<PathBuf>,

    /// Directory holding `.adjust` files; cameras are unadjusted when omitted
    #[arg(long)]
    adjust_dir: Option<PathBuf>,

    /// File name prefix of adjustment files
    #[arg(long, default_value = "")]
    adjust_prefix: String,

    /// Fail instead of using identity when an adjustment file is missing
    #[arg(long)]
    require_adjustments: bool,

    /// Evaluate residuals on a single thread
    #[arg(long)]
    sequential: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    init_logger();

    if !args.cameras.is_empty() && args.cameras.len() != args.images.len() {
        return Err(format!(
            "{} camera files given for {} images",
            args.cameras.len(),
            args.images.len()
        )
        .into());
    }

    let registry = SessionRegistry::with_default_sensors();
    let store = args
        .adjust_dir
        .as_ref()
        .map(|dir| FileAdjustmentStore::new(dir).with_prefix(args.adjust_prefix.clone()));
    let policy = if args.require_adjustments {
        MissingAdjustment::Fail
    } else {
        MissingAdjustment::UseIdentity
    };

    let mut models: Vec<Arc<dyn CameraModel>> = Vec::with_capacity(args.images.len());
    for (i, image) in args.images.iter().enumerate() {
        let mut inputs = SessionInputs::new(image);
        if let Some(camera) = args.cameras.get(i) {
            inputs = inputs.with_camera_file(camera);
        }

        let model: Arc<dyn CameraModel> = match &store {
            Some(store) => Arc::new(registry.construct_adjusted(&inputs, store, policy)?),
            None => registry.construct(&inputs)?,
        };
        info!("Camera {}: {}", i, describe(model.as_ref()));
        models.push(model);
    }

    let network = ControlNetworkLoader::load(&args.network)?;
    info!(
        "Loaded {} tie points, {} measurements",
        network.len(),
        network.num_measurements()
    );

    let config = ResidualConfig::default().with_parallel(!args.sequential);
    let start = Instant::now();
    let residuals = ResidualComputer::new(config).compute(&models, &network)?;
    let elapsed = start.elapsed();

    let overall = residuals.stats();
    info!(
        "Residuals: {} valid, {} invalid in {:.2} ms",
        residuals.valid_count(),
        residuals.invalid_count(),
        elapsed.as_secs_f64() * 1000.0
    );
    info!(
        "Overall: mean {:.4} px, rms {:.4} px, max {:.4} px",
        overall.mean, overall.rms, overall.max
    );

    let per_camera = residuals.per_camera_stats();
    for (i, model) in models.iter().enumerate() {
        match per_camera.get(&i) {
            Some(stats) => info!(
                "{:>4} {:<32} n={:<6} mean {:.4} px  rms {:.4} px  max {:.4} px",
                i,
                model.serial_number(),
                stats.count,
                stats.mean,
                stats.rms,
                stats.max
            ),
            None => warn!("{:>4} {:<32} no valid measurements", i, model.serial_number()),
        }
    }

    Ok(())
}
