//! Camera model construction from input files.
//!
//! A [`SessionRegistry`] maps each [`SensorFamily`] to a constructor. The
//! family is detected from the camera file:
//!
//! | Camera file | Family |
//! | --- | --- |
//! | `*.json` | the label's `sensor` tag |
//! | `*.rpb`, `*.rpc`, `*.xml` | [`SensorFamily::Rpc`] |
//! | none | `sensor` tag of the sidecar label `<image stem>.json` |
//!
//! Any other extension, and the RPC family itself, fail with
//! [`SessionError::NotImplemented`]. A label is read and parsed once into a
//! [`SensorSource`], which is then handed to the family's constructor.

use crate::adjustment::{AdjustmentError, AdjustmentStore, MissingAdjustment, load_correction};
use crate::camera::{AdjustedCameraModel, CameraError, CameraModel};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub mod label;

pub use label::{FrameGeometry, LineScanGeometry, SensorGeometry, SensorLabel};

/// Errors raised while selecting or constructing a camera model.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Sensor family '{variant}' is not implemented")]
    NotImplemented { variant: String },

    #[error("Invalid session configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Adjustment(#[from] AdjustmentError),

    #[error("IO error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("Invalid sensor label {}: {message}", path.display())]
    Label { path: PathBuf, message: String },
}

/// Supported sensor geometries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorFamily {
    Frame,
    LineScan,
    /// Rational polynomial coefficients; registered but not implemented
    Rpc,
}

impl SensorFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorFamily::Frame => "frame",
            SensorFamily::LineScan => "line_scan",
            SensorFamily::Rpc => "rpc",
        }
    }

    /// Family named by a label's `sensor` tag.
    pub fn from_tag(tag: &str) -> Result<Self, SessionError> {
        match tag {
            "frame" => Ok(SensorFamily::Frame),
            "line_scan" => Ok(SensorFamily::LineScan),
            "rpc" => Ok(SensorFamily::Rpc),
            other => Err(SessionError::NotImplemented {
                variant: other.to_string(),
            }),
        }
    }

    /// Detect the family of an image/camera file pair.
    pub fn detect(inputs: &SessionInputs) -> Result<Self, SessionError> {
        SensorSource::locate(inputs)?.family()
    }
}

/// Camera metadata located for one image, read from disk exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorSource {
    /// Parsed JSON sensor label
    Label {
        path: PathBuf,
        document: serde_json::Value,
    },
    /// Vendor RPC camera file; located but not interpreted
    Rpc(PathBuf),
}

impl SensorSource {
    /// Find and read the camera metadata for `inputs`.
    pub fn locate(inputs: &SessionInputs) -> Result<Self, SessionError> {
        let Some(camera_file) = &inputs.camera_file else {
            return Self::read_label(&inputs.label_path()?);
        };

        let extension = camera_file
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "json" => Self::read_label(camera_file),
            "rpb" | "rpc" | "xml" => Ok(SensorSource::Rpc(camera_file.clone())),
            "" => Err(SessionError::NotImplemented {
                variant: format!("camera file without extension ({})", camera_file.display()),
            }),
            other => Err(SessionError::NotImplemented {
                variant: format!(".{other} camera files"),
            }),
        }
    }

    fn read_label(path: &Path) -> Result<Self, SessionError> {
        let content = fs::read_to_string(path).map_err(|e| SessionError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let document = serde_json::from_str(&content).map_err(|e| SessionError::Label {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(SensorSource::Label {
            path: path.to_path_buf(),
            document,
        })
    }

    pub fn path(&self) -> &Path {
        match self {
            SensorSource::Label { path, .. } | SensorSource::Rpc(path) => path,
        }
    }

    /// Sensor family named by the file type or the label's `sensor` tag.
    pub fn family(&self) -> Result<SensorFamily, SessionError> {
        match self {
            SensorSource::Rpc(_) => Ok(SensorFamily::Rpc),
            SensorSource::Label { path, document } => {
                let tag = document
                    .get("sensor")
                    .and_then(|tag| tag.as_str())
                    .ok_or_else(|| SessionError::Label {
                        path: path.clone(),
                        message: "missing 'sensor' tag".to_string(),
                    })?;
                SensorFamily::from_tag(tag)
            }
        }
    }

    /// Deserialize the full label from the already parsed document.
    pub fn label(&self) -> Result<SensorLabel, SessionError> {
        match self {
            SensorSource::Label { path, document } => {
                SensorLabel::deserialize(document).map_err(|e| SessionError::Label {
                    path: path.clone(),
                    message: e.to_string(),
                })
            }
            SensorSource::Rpc(path) => Err(SessionError::Configuration(format!(
                "{} is not a JSON sensor label",
                path.display()
            ))),
        }
    }
}

impl fmt::Display for SensorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An image and its (optional) separate camera file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInputs {
    pub image_file: PathBuf,
    pub camera_file: Option<PathBuf>,
}

impl SessionInputs {
    pub fn new(image_file: impl Into<PathBuf>) -> Self {
        Self {
            image_file: image_file.into(),
            camera_file: None,
        }
    }

    #[must_use]
    pub fn with_camera_file(mut self, camera_file: impl Into<PathBuf>) -> Self {
        self.camera_file = Some(camera_file.into());
        self
    }

    /// Path of the JSON label describing this image.
    pub fn label_path(&self) -> Result<PathBuf, SessionError> {
        match &self.camera_file {
            None => Ok(self.image_file.with_extension("json")),
            Some(path) if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) => {
                Ok(path.clone())
            }
            Some(path) => Err(SessionError::Configuration(format!(
                "{} is not a JSON sensor label",
                path.display()
            ))),
        }
    }

    /// Resource id under which this image's adjustment is stored (the image stem).
    pub fn adjustment_id(&self) -> String {
        self.image_file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Builds a camera model from located metadata.
pub type CameraConstructor = fn(&SensorSource) -> Result<Arc<dyn CameraModel>, SessionError>;

/// Explicit mapping from sensor family to camera constructor.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    constructors: HashMap<SensorFamily, CameraConstructor>,
}

impl SessionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with frame, line scan and RPC entries.
    pub fn with_default_sensors() -> Self {
        let mut registry = Self::new();
        registry.register(SensorFamily::Frame, construct_frame);
        registry.register(SensorFamily::LineScan, construct_line_scan);
        registry.register(SensorFamily::Rpc, construct_rpc);
        registry
    }

    /// Register or replace the constructor for `family`, returning the previous one.
    pub fn register(
        &mut self,
        family: SensorFamily,
        constructor: CameraConstructor,
    ) -> Option<CameraConstructor> {
        self.constructors.insert(family, constructor)
    }

    pub fn is_registered(&self, family: SensorFamily) -> bool {
        self.constructors.contains_key(&family)
    }

    /// Detect the sensor family and construct its camera model.
    pub fn construct(&self, inputs: &SessionInputs) -> Result<Arc<dyn CameraModel>, SessionError> {
        self.construct_from_source(&SensorSource::locate(inputs)?)
    }

    /// Construct a camera model from metadata that has already been located.
    pub fn construct_from_source(
        &self,
        source: &SensorSource,
    ) -> Result<Arc<dyn CameraModel>, SessionError> {
        let family = source.family()?;
        let constructor =
            self.constructors
                .get(&family)
                .ok_or_else(|| SessionError::NotImplemented {
                    variant: family.to_string(),
                })?;

        info!(
            "Constructing {} camera from {}",
            family,
            source.path().display()
        );
        constructor(source)
    }

    /// Construct the base model and wrap it with its stored correction.
    pub fn construct_adjusted(
        &self,
        inputs: &SessionInputs,
        store: &dyn AdjustmentStore,
        policy: MissingAdjustment,
    ) -> Result<AdjustedCameraModel, SessionError> {
        let base = self.construct(inputs)?;
        let resource_id = inputs.adjustment_id();
        let correction = load_correction(store, &resource_id, policy)?;
        debug!("Applying {} to {}", correction, base.serial_number());
        Ok(AdjustedCameraModel::new(base, correction)?)
    }
}

fn construct_frame(source: &SensorSource) -> Result<Arc<dyn CameraModel>, SessionError> {
    Ok(Arc::new(source.label()?.to_frame_camera()?))
}

fn construct_line_scan(source: &SensorSource) -> Result<Arc<dyn CameraModel>, SessionError> {
    Ok(Arc::new(source.label()?.to_pushbroom_camera()?))
}

fn construct_rpc(_source: &SensorSource) -> Result<Arc<dyn CameraModel>, SessionError> {
    Err(SessionError::NotImplemented {
        variant: SensorFamily::Rpc.to_string(),
    })
}
