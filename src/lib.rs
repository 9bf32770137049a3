//! # geoadjust
//!
//! Camera models, pose adjustments and control-network residuals for
//! photogrammetric processing of remote-sensing imagery.
//!
//! ## Features
//!
//! - **Camera Models**: frame and pushbroom sensors behind one [`CameraModel`] trait,
//!   with intrinsic optics and extrinsic trajectory kept structurally separate
//! - **Pose Adjustments**: rigid corrections persisted per camera and composed
//!   transparently through [`AdjustedCameraModel`]
//! - **Residuals**: ordered reprojection errors over a [`ControlNetwork`], with
//!   per-measurement failure isolation and optional parallel evaluation
//! - **Sessions**: an explicit registry mapping sensor families to constructors
//!
//! ## Data Flow
//!
//! ```text
//! SessionRegistry ─► CameraModel ─► AdjustedCameraModel ◄─ AdjustmentStore
//!                                          │
//!                     ControlNetwork ─► ResidualComputer ─► ResidualVector ─► solver
//! ```

pub mod adjustment;
pub mod camera;
pub mod control;
pub mod error;
pub mod logger;
pub mod residual;
pub mod session;

pub use adjustment::{
    AdjustmentError, AdjustmentStore, FileAdjustmentStore, MissingAdjustment, PoseCorrection,
    load_correction,
};
pub use camera::{
    AdjustedCameraModel, CameraError, CameraModel, Extrinsics, FrameCamera, FrameOptics,
    LineScanOptics, LineScanTrajectory, Optics, PushbroomCamera, describe,
};
pub use control::{ControlNetwork, ControlNetworkError, ControlNetworkLoader, Measurement, TiePoint};
pub use error::{GeoAdjustError, GeoAdjustResult};
pub use logger::{init_logger, init_logger_with_level};
pub use residual::{
    Residual, ResidualComputer, ResidualConfig, ResidualError, ResidualStats, ResidualStatus,
    ResidualVector,
};
pub use session::{SensorFamily, SensorSource, SessionError, SessionInputs, SessionRegistry};
